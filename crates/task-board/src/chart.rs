use domain::{StatsSnapshot, TaskStatus};
use serde::Serialize;

pub const DATASET_LABEL: &str = "Task Status";
pub const SLICE_COLORS: [&str; 3] = ["#36A2EB", "#FFCE56", "#4BC0C0"];
const BAR_WIDTH: u64 = 30;

/// 円グラフのデータ（chart.js の `data` と同じ形）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PieChart {
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub label: String,
    pub data: Vec<u32>,
    pub background_color: Vec<String>,
    pub hover_background_color: Vec<String>,
}

impl PieChart {
    pub fn from_stats(stats: &StatsSnapshot) -> Self {
        let labels = TaskStatus::BUCKETS
            .iter()
            .map(|status| status.label().to_string())
            .collect();
        let data = TaskStatus::BUCKETS
            .iter()
            .map(|status| stats.get(status).unwrap_or(0))
            .collect();
        let colors: Vec<String> = SLICE_COLORS.iter().map(|c| c.to_string()).collect();

        Self {
            labels,
            datasets: vec![Dataset {
                label: DATASET_LABEL.to_string(),
                data,
                background_color: colors.clone(),
                hover_background_color: colors,
            }],
        }
    }

    pub fn total(&self) -> u64 {
        self.datasets
            .first()
            .map(|d| d.data.iter().map(|&n| u64::from(n)).sum())
            .unwrap_or(0)
    }

    /// 端末向けの表示（1行1区分、件数と割合）
    pub fn render_text(&self) -> Vec<String> {
        let Some(dataset) = self.datasets.first() else {
            return Vec::new();
        };
        let total = self.total();

        self.labels
            .iter()
            .zip(&dataset.data)
            .map(|(label, &count)| {
                let percent = if total == 0 {
                    0.0
                } else {
                    f64::from(count) * 100.0 / total as f64
                };
                let filled = if total == 0 {
                    0
                } else {
                    u64::from(count) * BAR_WIDTH / total
                };
                format!(
                    "{label:<12} {count:>5}  {percent:>5.1}%  {}",
                    "#".repeat(filled as usize)
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_shape() {
        let chart = PieChart::from_stats(&StatsSnapshot::new(3, 1, 0));
        let json = serde_json::to_value(&chart).unwrap();

        assert_eq!(json["labels"], serde_json::json!(["To-Do", "In-Progress", "Done"]));
        assert_eq!(json["datasets"][0]["label"], "Task Status");
        assert_eq!(json["datasets"][0]["data"], serde_json::json!([3, 1, 0]));
        assert_eq!(
            json["datasets"][0]["backgroundColor"],
            serde_json::json!(["#36A2EB", "#FFCE56", "#4BC0C0"])
        );
    }

    #[test]
    fn test_render_text_percentages() {
        let lines = PieChart::from_stats(&StatsSnapshot::new(3, 1, 0)).render_text();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("To-Do"));
        assert!(lines[0].contains("75.0%"));
        assert!(lines[1].contains("25.0%"));
        assert!(lines[2].contains("0.0%"));
    }

    #[test]
    fn test_total_does_not_overflow() {
        let chart = PieChart::from_stats(&StatsSnapshot::new(u32::MAX, 0, 1));
        assert_eq!(chart.total(), u64::from(u32::MAX) + 1);

        let lines = chart.render_text();
        assert!(lines[0].contains("100.0%"));
        assert!(lines[2].contains("0.0%"));
    }

    #[test]
    fn test_render_text_empty() {
        let lines = PieChart::from_stats(&StatsSnapshot::default()).render_text();
        assert!(lines.iter().all(|l| l.contains("0.0%")));
    }
}
