use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use lazy_static::lazy_static;
use log::info;
use num_traits::ToPrimitive;
use tensorboard_rs::summary_writer::SummaryWriter;

pub mod checkpoint;
pub mod config;
pub mod memory;
pub mod model;
pub mod on_policy_runner;
pub mod rl_utils;

/// Per-episode scalar sink. Values are collected under `(main_tag, sub_tag)`
/// and flushed once per step, to the log and optionally to TensorBoard.
pub struct EpochLogger {
    log_info: BTreeMap<(String, String), f32>,
    /// Values seen per key since the last flush.
    counts: HashMap<(String, String), u32>,
    writer: Option<SummaryWriter>,
}

lazy_static! {
    static ref EPOCH_LOGGER: Arc<Mutex<EpochLogger>> = Arc::new(Mutex::new(EpochLogger {
        log_info: BTreeMap::new(),
        counts: HashMap::new(),
        writer: None,
    }));
}

#[derive(Debug, Clone, Copy)]
pub enum EpochLoggerAggMode {
    Sum,
    Mean,
    Max,
    Min,
    Replace,
}

impl EpochLogger {
    fn global() -> MutexGuard<'static, EpochLogger> {
        EPOCH_LOGGER
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn init_writer(logdir: &str) {
        Self::global().writer = Some(SummaryWriter::new(logdir));
    }

    pub fn add_scalar<T: ToPrimitive>(main_tag_sub_tag: (&str, &str), val: T) {
        Self::add_scalar_agg(main_tag_sub_tag, val, EpochLoggerAggMode::Replace);
    }

    pub fn add_scalar_agg<T: ToPrimitive>(
        main_tag_sub_tag: (&str, &str),
        val: T,
        agg_mode: EpochLoggerAggMode,
    ) {
        Self::global().insert(main_tag_sub_tag, val, agg_mode);
    }

    /// Emits and clears everything collected since the last call.
    pub fn log(step: usize) -> BTreeMap<(String, String), f32> {
        Self::global().flush(step)
    }

    fn insert<T: ToPrimitive>(
        &mut self,
        main_tag_sub_tag: (&str, &str),
        val: T,
        agg_mode: EpochLoggerAggMode,
    ) {
        let mut val = val.to_f32().unwrap_or(f32::NAN);
        let key = (
            main_tag_sub_tag.0.to_string(),
            main_tag_sub_tag.1.to_string(),
        );
        let count = self.counts.entry(key.clone()).or_insert(0);
        *count += 1;
        if let Some(old_val) = self.log_info.get(&key) {
            val = match agg_mode {
                EpochLoggerAggMode::Sum => val + old_val,
                EpochLoggerAggMode::Mean => old_val + (val - old_val) / *count as f32,
                EpochLoggerAggMode::Max => val.max(*old_val),
                EpochLoggerAggMode::Min => val.min(*old_val),
                EpochLoggerAggMode::Replace => val,
            }
        }
        self.log_info.insert(key, val);
    }

    fn write_scalar(&mut self, main_tag: &str, sub_tag: &str, scalar: f32, step: usize) {
        if let Some(writer) = self.writer.as_mut() {
            let mut map = HashMap::<String, f32>::new();
            map.insert(sub_tag.to_string(), scalar);
            writer.add_scalars(&format!("{}/{}", main_tag, sub_tag), &map, step);
        }
    }

    fn flush(&mut self, step: usize) -> BTreeMap<(String, String), f32> {
        let log_info = std::mem::take(&mut self.log_info);
        self.counts.clear();
        let line = log_info
            .iter()
            .map(|((main_tag, sub_tag), scalar)| format!("{}/{}={:.5}", main_tag, sub_tag, scalar))
            .collect::<Vec<_>>()
            .join(" ");
        info!("episode={} {}", step, line);
        for ((main_tag, sub_tag), scalar) in &log_info {
            self.write_scalar(main_tag, sub_tag, *scalar, step);
        }
        if let Some(writer) = self.writer.as_mut() {
            writer.flush();
        }
        log_info
    }
}
