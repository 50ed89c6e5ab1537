use super::*;

// ============================================================================
// WindowState
// ============================================================================

#[test]
fn test_resize_is_edge_triggered() {
    let mut state = WindowState::new(PhysicalSize::new(800, 600));

    state.handle_event(&WindowEvent::Resized(PhysicalSize::new(1024, 768)));

    assert_eq!(state.extent(), (1024, 768));
    assert!(state.take_resized());
    assert!(!state.take_resized());
}

#[test]
fn test_minimize_reports_zero_extent() {
    let mut state = WindowState::new(PhysicalSize::new(800, 600));

    state.handle_event(&WindowEvent::Resized(PhysicalSize::new(0, 0)));

    assert_eq!(state.extent(), (0, 0));
}

#[test]
fn test_close_requested() {
    let mut state = WindowState::new(PhysicalSize::new(800, 600));
    assert!(!state.close_requested());

    state.handle_event(&WindowEvent::CloseRequested);

    assert!(state.close_requested());
}
