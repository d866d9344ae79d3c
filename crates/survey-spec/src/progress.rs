/// Percentage through the survey, counting the current page as reached.
pub fn calculate_progress(current_page: usize, total_pages: usize) -> u8 {
    if total_pages == 0 {
        return 0;
    }
    let ratio = (current_page + 1) as f64 / total_pages as f64;
    (ratio * 100.0).round().min(100.0) as u8
}

/// Whole seconds between two epoch millisecond timestamps.
pub fn response_duration_secs(start_ms: Option<i64>, end_ms: Option<i64>) -> Option<i64> {
    match (start_ms, end_ms) {
        (Some(start), Some(end)) if start > 0 && end > 0 => Some((end - start).div_euclid(1000)),
        _ => None,
    }
}
