use askama::Template;

use super::{PageContext, SubjectOption};
use crate::models::class_level::ClassLevelOption;
use crate::models::material::Material;

#[derive(Template)]
#[template(path = "materials/list.html")]
pub struct MaterialListTemplate {
    pub ctx: PageContext,
    pub materials: Vec<Material>,
    pub subjects: Vec<SubjectOption>,
    pub classes: Vec<ClassLevelOption>,
    pub file_types: Vec<(&'static str, &'static str)>,
    pub q: String,
    pub subject_filter: i64,
    pub class_filter: String,
    pub type_filter: String,
}

#[derive(Template)]
#[template(path = "materials/detail.html")]
pub struct MaterialDetailTemplate {
    pub ctx: PageContext,
    pub material: Material,
}

#[derive(Template)]
#[template(path = "materials/form.html")]
pub struct MaterialFormTemplate {
    pub ctx: PageContext,
    pub subjects: Vec<SubjectOption>,
    pub classes: Vec<ClassLevelOption>,
    pub file_types: Vec<(&'static str, &'static str)>,
    pub errors: Vec<String>,
    pub title: String,
    pub description: String,
    pub subject_id: i64,
    pub class_level: String,
    pub file_type: String,
    pub file_url: String,
    pub storage_key: String,
    pub storage_enabled: bool,
}
