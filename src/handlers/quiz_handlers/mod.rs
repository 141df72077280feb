pub mod manage;
pub mod take;
