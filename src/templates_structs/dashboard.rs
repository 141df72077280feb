use askama::Template;

use super::PageContext;
use crate::models::assignment::Assignment;
use crate::models::conference::Conference;

pub struct DashboardCard {
    pub label: String,
    pub value: i64,
    pub link: String,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub ctx: PageContext,
    pub cards: Vec<DashboardCard>,
    pub upcoming_conferences: Vec<Conference>,
    pub upcoming_assignments: Vec<Assignment>,
    pub zoom_connected: bool,
    pub zoom_oauth_available: bool,
}
