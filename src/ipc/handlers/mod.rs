pub mod assessments;
pub mod core;
pub mod courses;
pub mod goals;
pub mod grades;
pub mod settings;
