pub mod dot_splat;
pub mod ply;
