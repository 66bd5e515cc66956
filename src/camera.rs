use crate::math::{mat3_mul_vec, Mat3, Vec3};

#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub fov: f32,
}

impl Camera {
    pub fn new(position: Vec3, yaw: f32, pitch: f32) -> Self {
        let mut camera = Self {
            position,
            forward: Vec3::new(0.0, 0.0, -1.0),
            right: Vec3::new(1.0, 0.0, 0.0),
            up: Vec3::new(0.0, 1.0, 0.0),
            yaw,
            pitch,
            fov: std::f32::consts::PI / 3.0,
        };
        camera.update_vectors();
        camera
    }

    pub fn update_vectors(&mut self) {
        let forward = Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        )
        .normalize();

        let world_up = Vec3::new(0.0, 1.0, 0.0);
        let right = forward.cross(world_up).normalize();
        let up = right.cross(forward).normalize();

        self.forward = forward;
        self.right = if right.length_squared() < 1e-6 {
            Vec3::new(1.0, 0.0, 0.0)
        } else {
            right
        };
        self.up = up;
    }

    pub fn world_to_view(&self, point: Vec3) -> Vec3 {
        let rel = point - self.position;
        Vec3::new(rel.dot(self.right), rel.dot(self.up), rel.dot(self.forward))
    }

    /// View rotation with rows (right, up, forward); depth grows along
    /// the camera's forward axis.
    pub fn view_rotation(&self) -> Mat3 {
        [
            [self.right.x, self.right.y, self.right.z],
            [self.up.x, self.up.y, self.up.z],
            [self.forward.x, self.forward.y, self.forward.z],
        ]
    }

    pub fn focal_lengths(&self, width: u32, height: u32) -> (f32, f32) {
        let h = height.max(1) as f32;
        let w = width.max(1) as f32;
        let tan_half = (self.fov * 0.5).tan().max(1e-6);
        let fy = h / (2.0 * tan_half);
        let fx = fy * (w / h);
        (fx, fy)
    }

    pub fn look_at_target(&mut self, target: Vec3) {
        let to_target = target - self.position;
        if to_target.length_squared() < 1e-8 {
            return;
        }
        let to_target = to_target.normalize();
        self.yaw = to_target.z.atan2(to_target.x);
        self.pitch = to_target.y.clamp(-1.0, 1.0).asin();
        self.update_vectors();
    }
}

/// Flat per-dispatch camera/frame block consumed by the projection kernel.
///
/// The view transform is kept pre-decomposed as a 3x3 rotation plus a
/// translation; `p_view = rot * p_world + trans`.
#[derive(Debug, Clone)]
pub struct CameraParams {
    pub view_rot: Mat3,
    pub view_trans: Vec3,
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    pub width: u32,
    pub height: u32,
    pub tile_bounds: (u32, u32),
    pub tile_size: u32,
    pub clip_thresh: f32,
    pub tan_fov_x: f32,
    pub tan_fov_y: f32,
}

impl CameraParams {
    /// Build from a row-major 4x4 view matrix (rotation in the top-left
    /// 3x3, translation in the last column).
    pub fn from_view_matrix(
        view: [[f32; 4]; 4],
        (fx, fy): (f32, f32),
        (cx, cy): (f32, f32),
        (width, height): (u32, u32),
        tile_size: u32,
        clip_thresh: f32,
    ) -> Self {
        let mut view_rot = [[0.0; 3]; 3];
        for (row, out_row) in view_rot.iter_mut().enumerate() {
            out_row.copy_from_slice(&view[row][..3]);
        }
        let view_trans = Vec3::new(view[0][3], view[1][3], view[2][3]);
        Self::assemble(
            view_rot, view_trans, fx, fy, cx, cy, width, height, tile_size, clip_thresh,
        )
    }

    /// Build from an interactive camera, with the principal point at the
    /// image center and focal lengths from its field of view.
    pub fn from_camera(
        camera: &Camera,
        (width, height): (u32, u32),
        tile_size: u32,
        clip_thresh: f32,
    ) -> Self {
        let (fx, fy) = camera.focal_lengths(width, height);
        let view_rot = camera.view_rotation();
        let view_trans = -mat3_mul_vec(view_rot, camera.position);
        let cx = width as f32 * 0.5;
        let cy = height as f32 * 0.5;
        Self::assemble(
            view_rot, view_trans, fx, fy, cx, cy, width, height, tile_size, clip_thresh,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        view_rot: Mat3,
        view_trans: Vec3,
        fx: f32,
        fy: f32,
        cx: f32,
        cy: f32,
        width: u32,
        height: u32,
        tile_size: u32,
        clip_thresh: f32,
    ) -> Self {
        let tile_size = tile_size.max(1);
        Self {
            view_rot,
            view_trans,
            fx,
            fy,
            cx,
            cy,
            width,
            height,
            tile_bounds: (width.div_ceil(tile_size), height.div_ceil(tile_size)),
            tile_size,
            clip_thresh,
            tan_fov_x: width as f32 / (2.0 * fx.max(1e-6)),
            tan_fov_y: height as f32 / (2.0 * fy.max(1e-6)),
        }
    }

    pub fn world_to_view(&self, point: Vec3) -> Vec3 {
        mat3_mul_vec(self.view_rot, point) + self.view_trans
    }
}
