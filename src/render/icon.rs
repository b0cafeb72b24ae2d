//! Ratio-ring icon markup for station markers.
//!
//! The ring fakes a circular progress indicator with two spliced linear
//! gradients, because the target styling pipeline has no conic-gradient
//! primitive. The fill boundary sits at `bikes / (bikes + docks) * 360`
//! degrees; the formula switches at the halfway point, and the two branches
//! are intentionally different. An exact half-full ring (180 degrees) takes
//! the first branch.

use crate::options::GbfsLayerOptions;

/// Fill boundary angle for a bike/dock ratio, in degrees.
///
/// A station with zero bikes and zero docks is degenerate but occurs in
/// real feeds; it clamps to 0 instead of producing NaN.
fn ratio_degree(bikes: u32, docks: u32) -> f64 {
    let total = bikes + docks;
    if total == 0 {
        return 0.0;
    }
    f64::from(bikes) / f64::from(total) * 360.0
}

/// Build the two-tone ring markup for one station.
///
/// `bikes == 0` renders the inner badge semi-transparent, the "empty
/// station" cue.
pub fn station_icon_html(bikes: u32, docks: u32, options: &GbfsLayerOptions) -> String {
    let badge_css = if bikes == 0 {
        format!(
            "background: color-mix(in srgb, {} 50%, transparent); color: {};",
            options.station_marker_bg_color, options.station_marker_color
        )
    } else {
        format!(
            "background: {}; color: {};",
            options.station_marker_bg_color, options.station_marker_color
        )
    };

    let degree = ratio_degree(bikes, docks);
    let ring_css = if degree <= 180.0 {
        format!(
            "background: {color}; background-image: \
             linear-gradient({angle}deg, transparent 50%, {bg} 50%), \
             linear-gradient(90deg, {bg} 50%, transparent 50%);",
            color = options.bike_marker_color,
            angle = 90.0 + degree,
            bg = options.bike_marker_bg_color,
        )
    } else {
        format!(
            "background: {color}; background-image: \
             linear-gradient({angle}deg, transparent 50%, {color} 50%), \
             linear-gradient(90deg, {bg} 50%, transparent 50%);",
            color = options.bike_marker_color,
            angle = degree - 90.0,
            bg = options.bike_marker_bg_color,
        )
    };

    format!(
        "<div class=\"station-icon-ring\" style=\"{ring_css}\">\
         <div class=\"station-icon-inner\" style=\"{badge_css}\">{bikes}</div>\
         </div>"
    )
}

// ============================================================================
// Tests
// ============================================================================
