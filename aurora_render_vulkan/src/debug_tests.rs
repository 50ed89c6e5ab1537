use super::*;

// ============================================================================
// SEVERITY / CATEGORY MAPPING
// ============================================================================

#[test]
fn test_severity_most_severe_bit_wins() {
    let flags = vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
        | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR;
    assert_eq!(MessageSeverity::from_vk(flags), MessageSeverity::Error);
    assert_eq!(
        MessageSeverity::from_vk(vk::DebugUtilsMessageSeverityFlagsEXT::INFO),
        MessageSeverity::Info
    );
    assert_eq!(
        MessageSeverity::from_vk(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE),
        MessageSeverity::Verbose
    );
}

#[test]
fn test_message_type_label() {
    assert_eq!(message_type_label(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION), "Validation");
    assert_eq!(message_type_label(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE), "Performance");
    assert_eq!(message_type_label(vk::DebugUtilsMessageTypeFlagsEXT::GENERAL), "General");
}

// ============================================================================
// STATISTICS
// ============================================================================

#[test]
fn test_validation_stats_total() {
    let stats = ValidationStats { errors: 1, warnings: 2, info: 3, verbose: 4 };
    assert_eq!(stats.total(), 10);
    assert_eq!(ValidationStats::default().total(), 0);
}

#[test]
fn test_stats_tracker_records_per_severity() {
    let tracker = ValidationStatsTracker::new();
    tracker.record(MessageSeverity::Error);
    tracker.record(MessageSeverity::Warning);
    tracker.record(MessageSeverity::Warning);
    let stats = tracker.get_stats();
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.warnings, 2);
    assert_eq!(stats.info, 0);

    tracker.reset();
    assert_eq!(tracker.get_stats().total(), 0);
}

#[test]
fn test_callback_ignores_null_data() {
    let result = unsafe {
        vulkan_debug_callback(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
            std::ptr::null(),
            std::ptr::null_mut(),
        )
    };
    assert_eq!(result, vk::FALSE);
}
