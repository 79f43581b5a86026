//! Drivers for running without a screen: log lines and CSV frames.

use anyhow::anyhow;
use chrono::TimeZone;
use log::{info, warn};
use rankreel_core::{
    color::Color,
    names::Directory,
    ranking::Ranking,
    window::TimeWindow,
};
use serde::Serialize;
use std::{collections::HashMap, fs::File, io::Write, path::Path};

use crate::animation::{AnimationDriver, Transition};

/// Logs every transition, naming entities through a directory.
#[derive(Debug, Clone, Default)]
pub struct LogDriver {
    names: Directory,
}

impl LogDriver {
    pub fn new(names: Directory) -> Self {
        LogDriver { names }
    }
}

impl<Tz: TimeZone> AnimationDriver<Tz> for LogDriver {
    fn begin(&mut self, transition: &Transition<Tz>) {
        info!(
            "{}: {} entries, largest value {}",
            transition.window.label(),
            transition.len(),
            transition.largest_value
        );
        for (rank, ((before, after), color)) in transition
            .from
            .iter()
            .zip(transition.to.iter())
            .zip(transition.colors.iter())
            .enumerate()
        {
            info!(
                "{:>3}. {:<48} {:>8} -> {:<8} {:>5.1}% {}",
                rank + 1,
                self.names.name_of(&after.key),
                before.value,
                after.value,
                transition.fraction(after.value) * 100.0,
                color
            );
        }
    }

    fn settle(&mut self, window: &TimeWindow<Tz>, ranking: &Ranking) {
        match ranking.entries().first() {
            Some(leader) => info!(
                "{} settled, led by {} with {}",
                window.label(),
                self.names.name_of(&leader.key),
                leader.value
            ),
            None => info!("{} settled with nothing to show", window.label()),
        }
    }

    fn no_results(&mut self, window: &TimeWindow<Tz>) {
        info!("{}: no results", window.label());
    }
}

#[derive(Debug, Serialize)]
struct FrameRow<'a> {
    period: &'a str,
    start: &'a str,
    end: &'a str,
    rank: usize,
    key: &'a str,
    name: &'a str,
    value: u64,
    color: Option<Color>,
}

/// Writes each settled ranking as a block of CSV rows.
pub struct CsvFrameDriver<W: Write> {
    writer: csv::Writer<W>,
    names: Directory,
    colors: HashMap<String, Color>,
}

impl CsvFrameDriver<File> {
    pub fn create(path: impl AsRef<Path>, names: Directory) -> anyhow::Result<Self> {
        Ok(CsvFrameDriver::from_writer(File::create(path)?, names))
    }
}

impl<W: Write> CsvFrameDriver<W> {
    pub fn from_writer(writer: W, names: Directory) -> Self {
        CsvFrameDriver {
            writer: csv::Writer::from_writer(writer),
            names,
            colors: HashMap::new(),
        }
    }

    pub fn into_inner(self) -> anyhow::Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow!("failed to flush frames: {}", e.error()))
    }

    fn write_frame<Tz: TimeZone>(
        &mut self,
        window: &TimeWindow<Tz>,
        ranking: &Ranking,
    ) -> csv::Result<()> {
        let period = window.label();
        let start = window.start.naive_local().to_string();
        let end = window.end.naive_local().to_string();
        for (rank, entry) in ranking.iter().enumerate() {
            self.writer.serialize(FrameRow {
                period: &period,
                start: &start,
                end: &end,
                rank: rank + 1,
                key: &entry.key,
                name: self.names.name_of(&entry.key),
                value: entry.value,
                color: self.colors.get(&entry.key).copied(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

impl<Tz, W> AnimationDriver<Tz> for CsvFrameDriver<W>
where
    Tz: TimeZone,
    W: Write + Send,
{
    fn begin(&mut self, transition: &Transition<Tz>) {
        for (entry, color) in transition.to.iter().zip(transition.colors.iter()) {
            self.colors.insert(entry.key.clone(), *color);
        }
    }

    fn settle(&mut self, window: &TimeWindow<Tz>, ranking: &Ranking) {
        if let Err(e) = self.write_frame(window, ranking) {
            warn!("Failed to write frame for {}: {}", window.label(), e);
        }
    }

    fn no_results(&mut self, _window: &TimeWindow<Tz>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rankreel_core::{
        ranking::{merge, Entry},
        scale::ScaleUnit,
        window::compute_window,
    };
    use std::time::Duration;

    fn window(year: i32) -> TimeWindow<Utc> {
        let anchor = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap();
        compute_window(&anchor, ScaleUnit::Year).unwrap()
    }

    fn transition(year: i32, pairs: &[(&str, u64)]) -> Transition<Utc> {
        let counts = pairs.iter().map(|(k, v)| Entry::new(*k, *v)).collect();
        let merged = merge(&Ranking::empty(), Ranking::top(counts, 15));
        let colors = (0..merged.new.len() as u32)
            .map(|i| Color::from_rgb(0x100000 * (i + 1)))
            .collect();
        Transition {
            window: window(year),
            from: merged.old,
            to: merged.new,
            colors,
            largest_value: merged.largest_value,
            duration: Duration::from_millis(1350),
        }
    }

    #[test]
    fn test_csv_frames_are_written_on_settle() {
        let names = Directory::parse_csv("entity_id,name\nhttps://a,Alpha\n").unwrap();
        let mut driver = CsvFrameDriver::from_writer(Vec::new(), names);
        let step = transition(2020, &[("https://a", 9), ("https://b", 4)]);
        driver.begin(&step);
        driver.no_results(&window(2021));
        driver.settle(&step.window, &step.to);

        let written = String::from_utf8(driver.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines[0], "period,start,end,rank,key,name,value,color");
        assert_eq!(
            lines[1],
            "2020,2020-01-01 00:00:00,2021-01-01 00:00:00,1,https://a,Alpha,9,#100000"
        );
        assert_eq!(
            lines[2],
            "2020,2020-01-01 00:00:00,2021-01-01 00:00:00,2,https://b,https://b,4,#200000"
        );
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_log_driver_accepts_empty_rankings() {
        let mut driver = LogDriver::default();
        let step = transition(2020, &[]);
        driver.begin(&step);
        driver.settle(&step.window, &step.to);
        driver.no_results(&window(2021));
    }
}
