use super::*;

fn surface_format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
    vk::SurfaceFormatKHR { format, color_space }
}

fn capabilities(min: u32, max: u32, current: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
    vk::SurfaceCapabilitiesKHR {
        min_image_count: min,
        max_image_count: max,
        current_extent: vk::Extent2D { width: current.0, height: current.1 },
        min_image_extent: vk::Extent2D { width: 1, height: 1 },
        max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
        ..Default::default()
    }
}

// ============================================================================
// SURFACE FORMAT
// ============================================================================

#[test]
fn test_surface_format_prefers_bgra_srgb() {
    let formats = [
        surface_format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        surface_format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
    ];
    let (chosen, format) = choose_surface_format(&formats).unwrap();
    assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
    assert_eq!(format, ImageFormat::B8G8R8A8_SRGB);
}

#[test]
fn test_surface_format_falls_back_to_first_known() {
    let formats = [
        surface_format(vk::Format::A2B10G10R10_UNORM_PACK32, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        surface_format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
    ];
    let (_, format) = choose_surface_format(&formats).unwrap();
    assert_eq!(format, ImageFormat::B8G8R8A8_UNORM);
}

#[test]
fn test_surface_format_none_when_unknown() {
    let formats = [surface_format(vk::Format::A2B10G10R10_UNORM_PACK32, vk::ColorSpaceKHR::SRGB_NONLINEAR)];
    assert!(choose_surface_format(&formats).is_none());
    assert!(choose_surface_format(&[]).is_none());
}

// ============================================================================
// PRESENT MODE
// ============================================================================

#[test]
fn test_present_mode_vsync_is_fifo() {
    let modes = [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO];
    assert_eq!(choose_present_mode(&modes, true), vk::PresentModeKHR::FIFO);
}

#[test]
fn test_present_mode_prefers_mailbox_without_vsync() {
    let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
    assert_eq!(choose_present_mode(&modes, false), vk::PresentModeKHR::MAILBOX);
    assert_eq!(choose_present_mode(&[vk::PresentModeKHR::FIFO], false), vk::PresentModeKHR::FIFO);
}

#[test]
fn test_present_mode_names() {
    assert_eq!(present_mode_name(vk::PresentModeKHR::FIFO), "FIFO");
    assert_eq!(present_mode_name(vk::PresentModeKHR::MAILBOX), "MAILBOX");
}

// ============================================================================
// EXTENT / IMAGE COUNT
// ============================================================================

#[test]
fn test_extent_uses_fixed_surface_extent() {
    let caps = capabilities(2, 3, (800, 600));
    let extent = choose_extent(&caps, 1920, 1080);
    assert_eq!((extent.width, extent.height), (800, 600));
}

#[test]
fn test_extent_clamps_window_size() {
    let caps = capabilities(2, 3, (u32::MAX, u32::MAX));
    let extent = choose_extent(&caps, 10_000, 0);
    assert_eq!((extent.width, extent.height), (4096, 1));
}

#[test]
fn test_image_count_is_min_plus_one() {
    assert_eq!(choose_image_count(&capabilities(2, 8, (1, 1))), 3);
}

#[test]
fn test_image_count_clamped_to_max() {
    assert_eq!(choose_image_count(&capabilities(3, 3, (1, 1))), 3);
}

#[test]
fn test_image_count_unbounded_max() {
    assert_eq!(choose_image_count(&capabilities(2, 0, (1, 1))), 3);
}
