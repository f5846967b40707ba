//! ASCII rendering of a [`TrainingReport`] for terminals and logs.

use crate::training::report::TrainingReport;

const MIN_WIDTH: usize = 10;
const MIN_HEIGHT: usize = 5;

/// Scatter a series onto a `width × height` character grid with axes.
pub fn plot_series(values: &[f32], title: &str, width: usize, height: usize) -> String {
    if values.is_empty() {
        return format!("{title}: no data\n");
    }
    if width < MIN_WIDTH || height < MIN_HEIGHT {
        return format!("{title}: plot needs at least {MIN_WIDTH}x{MIN_HEIGHT}\n");
    }

    let finite: Vec<f32> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let min_val = finite.iter().copied().fold(f32::INFINITY, f32::min);
    let max_val = finite.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if finite.is_empty() {
        return format!("{title}: no finite values\n");
    }
    if (max_val - min_val).abs() < f32::EPSILON {
        return format!("{title}: all {} values are {min_val:.4}\n", values.len());
    }

    let mut grid = vec![vec![' '; width]; height];
    for row in grid.iter_mut() {
        row[0] = '|';
    }
    grid[height - 1].iter_mut().for_each(|c| *c = '-');
    grid[height - 1][0] = '+';

    let plot_cols = width - 3;
    let plot_rows = height - 1;
    let last = values.len().saturating_sub(1).max(1) as f32;
    for (i, &value) in values.iter().enumerate() {
        if !value.is_finite() {
            continue;
        }
        let x = 2 + ((i as f32 / last) * plot_cols as f32).round() as usize;
        let level = ((value - min_val) / (max_val - min_val) * (plot_rows - 1) as f32).round() as usize;
        grid[plot_rows - 1 - level][x.min(width - 1)] = '*';
    }

    let mut out = format!("{title}\nMax: {max_val:.4}\n");
    for row in &grid {
        out.extend(row.iter());
        out.push('\n');
    }
    out.push_str(&format!("Min: {min_val:.4}\nPoints: {}\n", values.len()));
    out
}

/// Horizontal bars, one per labelled count, scaled to `width` characters.
pub fn bar_chart(entries: &[(String, u64)], title: &str, width: usize) -> String {
    if entries.is_empty() {
        return format!("{title}: no data\n");
    }
    let label_width = entries.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    let max_count = entries.iter().map(|&(_, c)| c).max().unwrap_or(0).max(1);

    let mut out = format!("{title}\n");
    for (label, count) in entries {
        let bar = (*count as f64 / max_count as f64 * width as f64).round() as usize;
        out.push_str(&format!("{label:>label_width$} | {} {count}\n", "#".repeat(bar)));
    }
    out
}

impl TrainingReport {
    /// Episode rewards, curriculum metrics and regime transition counts as text.
    pub fn plot(&self, width: usize, height: usize) -> String {
        let transitions: Vec<(String, u64)> = self
            .regime_transitions
            .iter()
            .map(|t| (format!("{}->{}", t.from, t.to), t.count))
            .collect();

        let mut out = plot_series(&self.episode_rewards, "Episode Rewards", width, height);
        out.push('\n');
        out.push_str(&plot_series(&self.curriculum_metrics, "Curriculum Evaluation Metrics", width, height));
        out.push('\n');
        out.push_str(&bar_chart(&transitions, "Regime Transitions", width));
        out.push_str(&format!(
            "Final stage: {} | Episodes: {} | Steps: {}\n",
            self.final_stage, self.episodes, self.total_steps
        ));
        out
    }
}
