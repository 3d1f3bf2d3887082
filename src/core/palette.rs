//! Static colour tables: the 17 SDG goals and the fixed thematic layer colours.

use serde::Serialize;

/// One Sustainable Development Goal entry of the dashboard's SDG bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SdgGoal {
    pub id: u8,
    pub label: &'static str,
    pub color: &'static str,
    pub icon: &'static str,
}

const fn goal(id: u8, label: &'static str, color: &'static str, icon: &'static str) -> SdgGoal {
    SdgGoal {
        id,
        label,
        color,
        icon,
    }
}

pub const SDG_GOALS: [SdgGoal; 17] = [
    goal(1, "No Poverty", "#E5243B", "🏠"),
    goal(2, "Zero Hunger", "#DDA63A", "🌾"),
    goal(3, "Good Health and Well-being", "#4C9F38", "🏥"),
    goal(4, "Quality Education", "#C5192D", "🎓"),
    goal(5, "Gender Equality", "#FF3A21", "⚖️"),
    goal(6, "Clean Water and Sanitation", "#26BDE2", "💧"),
    goal(7, "Affordable and Clean Energy", "#FCC30B", "⚡"),
    goal(8, "Decent Work and Economic Growth", "#A21942", "💼"),
    goal(9, "Industry, Innovation and Infrastructure", "#FD6925", "🏗️"),
    goal(10, "Reduced Inequalities", "#DD1367", "📊"),
    goal(11, "Sustainable Cities and Communities", "#FD9D24", "🏙️"),
    goal(12, "Responsible Consumption and Production", "#BF8B2E", "♻️"),
    goal(13, "Climate Action", "#3F7E44", "🌍"),
    goal(14, "Life Below Water", "#0A97D9", "🐠"),
    goal(15, "Life on Land", "#56C02B", "🌳"),
    goal(16, "Peace, Justice and Strong Institutions", "#00689D", "⚖️"),
    goal(17, "Partnerships for the Goals", "#19486A", "🤝"),
];

/// Looks up an SDG goal by its 1-based id
pub fn sdg_goal(id: u8) -> Option<&'static SdgGoal> {
    SDG_GOALS.iter().find(|g| g.id == id)
}

pub const TEHSIL_FILL: &str = "#4C9F70";
pub const TEHSIL_BORDER: &str = "#2F6B4A";
pub const CONTOUR_LINE: &str = "#888888";
pub const METRO_LINE: &str = "#00A9E0";
pub const METRO_STATION: &str = "#FF8C00";
pub const RAILWAY_LINE: &str = "#6A7D7D";
pub const RAILWAY_STATION: &str = "#8E44AD";

/// Colours handed out to uploaded layers, in rotation
pub const UPLOAD_COLORS: [&str; 10] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FECA57", "#FF9FF3", "#54A0FF", "#5F27CD",
    "#00D2D3", "#FF9F43",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sdg_ids_are_sequential() {
        for (idx, goal) in SDG_GOALS.iter().enumerate() {
            assert_eq!(goal.id as usize, idx + 1);
        }
    }

    #[test]
    fn test_sdg_lookup() {
        assert_eq!(sdg_goal(13).map(|g| g.label), Some("Climate Action"));
        assert!(sdg_goal(0).is_none());
        assert!(sdg_goal(18).is_none());
    }
}
