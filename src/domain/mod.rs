pub mod entities;
pub mod status;
