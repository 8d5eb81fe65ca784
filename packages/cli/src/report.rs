//! Terminal summaries printed after each stage.

use junction_danger_analytics_models::{DangerousJunctions, RankingFilter, ScoredCollision};
use junction_danger_collision::DropReport;
use junction_danger_pipeline::RunSummary;
use junction_danger_spatial::MatchReport;

pub fn print_drop_report(report: &DropReport, kept: usize) {
    println!();
    println!("Normalized {kept} of {} collisions", report.rows_in);
    println!("  {:<36} {}", "missing date/borough/junction", report.missing_required);
    println!("  {:<36} {}", "junction type not allowed", report.junction_type);
    println!("  {:<36} {}", "no cyclist/pedestrian casualty", report.no_relevant_casualty);
    println!("  {:<36} {}", "duplicate collision ID", report.duplicate_id);
    println!("  {:<36} {}", "invalid casualty rows", report.invalid_casualties);
}

pub fn print_match_report(report: &MatchReport) {
    println!();
    println!(
        "Matched {} of {} collisions",
        report.matched, report.collisions_in
    );
    println!("  {:<36} {}", "missing coordinates", report.missing_coordinates);
    println!("  {:<36} {}", "invalid coordinates", report.invalid_coordinates);
    println!("  {:<36} {}", "beyond distance threshold", report.beyond_threshold);
}

fn describe(filter: &RankingFilter) -> String {
    let boroughs = filter.boroughs.as_ref().map_or_else(
        || "all boroughs".to_string(),
        |b| b.iter().cloned().collect::<Vec<_>>().join(", "),
    );
    let years = match (filter.min_year, filter.max_year) {
        (None, None) => "all years".to_string(),
        (min, max) => format!(
            "{}-{}",
            min.map_or_else(String::new, |y| y.to_string()),
            max.map_or_else(String::new, |y| y.to_string())
        ),
    };
    format!("{} / {boroughs} / {years}", filter.casualty_type)
}

pub fn print_ranking(filter: &RankingFilter, ranking: &DangerousJunctions) {
    println!();
    println!("Most dangerous junctions: {}", describe(filter));

    if ranking.is_empty() {
        println!("  (no junctions match this filter)");
        return;
    }

    println!(
        "{:>4}  {:<40} {:>10} {:>5} {:>7} {:>6} {:>8}",
        "RANK", "JUNCTION", "DANGER", "FATAL", "SERIOUS", "SLIGHT", "TREND"
    );
    println!("{}", "-".repeat(88));
    for junction in &ranking.junctions {
        let trend = junction
            .danger_metric_trajectory
            .map_or_else(|| "-".to_string(), |slope| format!("{slope:+.2}"));
        println!(
            "{:>4}  {:<40} {:>10.3} {:>5} {:>7} {:>6} {:>8}",
            junction.junction_rank,
            junction.junction_cluster_name,
            junction.recency_danger_metric,
            junction.counts.fatal,
            junction.counts.serious,
            junction.counts.slight,
            trend
        );
    }
}

fn collision_line(collision: &ScoredCollision) -> String {
    format!(
        "{}  {:<18} {:<8} {:>3}/{:>3}/{:>3} {:>8.3} {:>6.1}m",
        collision.date,
        collision.collision_id,
        collision.max_severity.as_ref(),
        collision.counts.fatal,
        collision.counts.serious,
        collision.counts.slight,
        collision.recency_danger_metric,
        collision.distance_to_junction
    )
}

pub fn print_cluster_collisions(name: &str, collisions: &[ScoredCollision]) {
    println!();
    println!("{} collisions at {name}", collisions.len());
    if collisions.is_empty() {
        return;
    }
    println!(
        "{:<10}  {:<18} {:<8} {:>11} {:>8} {:>7}",
        "DATE", "COLLISION", "WORST", "F/S/S", "DANGER", "DIST"
    );
    for collision in collisions {
        println!("{}", collision_line(collision));
    }
}

pub fn print_run_summary(summary: &RunSummary) {
    println!();
    println!(
        "Junction table: {} junctions in {} clusters",
        summary.junctions, summary.clusters
    );
    print_drop_report(
        &summary.normalized,
        summary.normalized.rows_in - summary.normalized.dropped(),
    );
    print_match_report(&summary.matched);

    println!();
    for (filter, ranked) in &summary.rankings {
        println!("Ranked {ranked} junctions for {}", describe(filter));
    }
    for path in &summary.exports {
        println!("Exported {}", path.display());
    }
}
