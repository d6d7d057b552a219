use pixel_streaming_launcher::install::progress::{AggregateProgress, ProgressTracker};

#[test]
fn aggregate_sums_deltas_across_files() {
    let mut overall = AggregateProgress::new(150);

    overall.start_file();
    overall.update(40);
    overall.update(100);
    overall.start_file();
    overall.update(10);
    let done = overall.update(50);

    assert_eq!(done, 150);
    assert_eq!(overall.done(), overall.total());
}

#[test]
fn restarted_counter_does_not_double_count() {
    let mut overall = AggregateProgress::new(20);

    overall.start_file();
    overall.update(10);
    overall.start_file();
    overall.update(5);
    overall.update(10);

    assert_eq!(overall.done(), 20);
}

#[test]
fn repeated_report_adds_nothing() {
    let mut overall = AggregateProgress::new(8);

    overall.start_file();
    overall.update(8);
    overall.update(8);

    assert_eq!(overall.done(), 8);
}

#[test]
fn tracker_reports_cumulative_bytes_and_total() {
    let mut reports = Vec::new();
    {
        let mut tracker = ProgressTracker::new(0, |current, total| reports.push((current, total)));
        tracker.set_total(7);
        tracker.record(3);
        tracker.record(4);
        assert_eq!(tracker.current(), 7);
    }

    assert_eq!(reports, vec![(3, 7), (7, 7)]);
}
