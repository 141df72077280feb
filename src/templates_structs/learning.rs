use askama::Template;

use super::PageContext;
use crate::models::insights::{ImprovementArea, WeeklySummary};

#[derive(Template)]
#[template(path = "learning/weekly_summary.html")]
pub struct WeeklySummaryTemplate {
    pub ctx: PageContext,
    pub summary: WeeklySummary,
}

#[derive(Template)]
#[template(path = "learning/improvement_areas.html")]
pub struct ImprovementAreasTemplate {
    pub ctx: PageContext,
    pub areas: Vec<ImprovementArea>,
}
