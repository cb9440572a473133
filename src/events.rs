use crate::model::FeatureId;
use chrono::NaiveDate;

/// What the timeline reports back to its host after an interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GanttEvent {
    /// A dragged bar was dropped on new dates.
    Move {
        id: FeatureId,
        start_at: NaiveDate,
        end_at: Option<NaiveDate>,
    },
    /// A bar was clicked while dragging is disabled.
    Click(FeatureId),
    /// A sidebar row was picked.
    SelectItem(FeatureId),
    /// An empty part of the timeline was clicked.
    AddItem(NaiveDate),
}
