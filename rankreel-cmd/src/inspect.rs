//! Offline helpers: list windows, show which scales a period allows.

use anyhow::bail;
use rankreel_core::{
    period::{days_between, Mode, PeriodSelection},
    scale::ScaleUnit,
    window::Windows,
};
use rankreel_utils::dates;

/// Print `count` successive windows starting with the one containing `from`.
pub fn run_windows(from: &str, scale: ScaleUnit, count: usize) -> anyhow::Result<()> {
    if scale == ScaleUnit::None {
        bail!("scale none has no calendar windows");
    }
    let anchor = dates::parse_local(from)?;
    for window in Windows::new(&anchor, scale).take(count) {
        println!(
            "{:<10} {} .. {}",
            window.label(),
            dates::format_minute(&window.start),
            dates::format_minute(&window.end)
        );
    }
    Ok(())
}

/// Print the scales offered between `from` and `to`, and what `scale` becomes.
pub fn run_scales(from: &str, to: &str, mode: Mode, scale: ScaleUnit) -> anyhow::Result<()> {
    let from = dates::parse_local(from)?;
    let to = dates::parse_local(to)?;
    let days = days_between(&from, &to);
    let selection = PeriodSelection::with_range(from, to, scale, mode)?;
    let offered: Vec<&str> = selection.offered().iter().map(|s| s.as_str()).collect();
    println!("span:    {:.2} days ({})", days, mode);
    println!("offered: {}", offered.join(", "));
    if selection.scale() == scale {
        println!("scale:   {}", scale);
    } else {
        println!("scale:   {} (demoted from {})", selection.scale(), scale);
    }
    Ok(())
}
