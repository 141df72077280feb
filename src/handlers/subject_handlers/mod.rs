pub mod class_subjects;
pub mod crud;
