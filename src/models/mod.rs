pub mod assignment;
pub mod class_level;
pub mod class_subject;
pub mod conference;
pub mod insights;
pub mod material;
pub mod oauth_token;
pub mod password_reset;
pub mod quiz;
pub mod recording;
pub mod settings;
pub mod subject;
pub mod tutor;
pub mod user;
