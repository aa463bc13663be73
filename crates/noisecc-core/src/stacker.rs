// crates/noisecc-core/src/stacker.rs
//
// Multi-event stacking: sum per-event correlation products that share a
// station-pair tag into a single trace per tag, then apply the optional
// post-stack transforms (symmetrize, lag window, bandpass). Transform
// failures never invalidate the raw stack already on disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use noisecc_sac::{dsp, Trace};

use crate::config::StackConfig;
use crate::error::Result;
use crate::types::{EventKey, PairName};

#[derive(Debug, Default)]
pub struct StackOutcome {
    /// Tag strings like `STA1_STA2.ZZ` mapped to the number of events that
    /// contributed to each stack.
    pub stacked: BTreeMap<String, u32>,
    /// Tags whose post-stack transforms failed; the raw stack is still
    /// written for these.
    pub transform_failures: Vec<(String, String)>,
    pub skipped_instances: usize,
}

pub struct Stacker<'a> {
    pub config: &'a StackConfig,
}

impl<'a> Stacker<'a> {
    /// Stack every final product across the given event directories into
    /// `stack_dir`. The first instance of each tag fixes the time axis;
    /// later instances with a different delta or length are skipped with a
    /// warning rather than poisoning the sum.
    pub fn stack(
        &self,
        data_dir: &Path,
        events: &[EventKey],
        stack_dir: &Path,
    ) -> Result<StackOutcome> {
        std::fs::create_dir_all(stack_dir)?;
        let mut outcome = StackOutcome::default();
        let mut stacks: BTreeMap<String, Trace> = BTreeMap::new();

        for event in events {
            let event_dir = data_dir.join(event.tag());
            if !event_dir.is_dir() {
                continue;
            }
            for (tag, path) in final_products(&event_dir)? {
                let instance = match Trace::read(&path) {
                    Ok(instance) => instance,
                    Err(error) => {
                        warn!(%tag, path = %path.display(), %error, "unreadable product, skipping");
                        outcome.skipped_instances += 1;
                        continue;
                    }
                };
                match stacks.get_mut(&tag) {
                    None => {
                        stacks.insert(tag.clone(), instance);
                        *outcome.stacked.entry(tag).or_insert(0) += 1;
                    }
                    Some(stack) => {
                        if (stack.delta() - instance.delta()).abs() > f64::EPSILON
                            || stack.npts() != instance.npts()
                        {
                            warn!(
                                %tag,
                                event = %event,
                                "axis mismatch against first instance, skipping"
                            );
                            outcome.skipped_instances += 1;
                            continue;
                        }
                        if let Err(error) = dsp::add_into(stack, &instance) {
                            warn!(%tag, event = %event, %error, "skipping instance");
                            outcome.skipped_instances += 1;
                            continue;
                        }
                        *outcome.stacked.entry(tag).or_insert(0) += 1;
                    }
                }
            }
        }

        for (tag, mut stack) in stacks {
            let count = outcome.stacked[&tag];
            stack.header.user0 = Some(count as f64);
            let target = stack_dir.join(&tag);
            stack.write(&target)?;
            info!(%tag, count, "raw stack written");

            if let Err(reason) = self.transform(&target, &mut stack) {
                warn!(%tag, %reason, "post-stack transform failed, raw stack kept");
                outcome.transform_failures.push((tag, reason));
            }
        }
        Ok(outcome)
    }

    /// Fixed transform order: symmetrize, then lag window, then bandpass.
    fn transform(&self, target: &Path, stack: &mut Trace) -> std::result::Result<(), String> {
        let mut touched = false;
        if self.config.symmetrize {
            dsp::symmetrize(stack);
            touched = true;
        }
        if let Some(window) = &self.config.window {
            let delta = stack.delta();
            *stack = stack
                .cut(window.min_lag_s, window.max_lag_s + delta)
                .map_err(|e| e.to_string())?;
            touched = true;
        }
        if let Some(bandpass) = &self.config.bandpass {
            let low_hz = 1.0 / bandpass.high_period_s;
            let high_hz = 1.0 / bandpass.low_period_s;
            dsp::bandpass(stack, low_hz, high_hz, bandpass.poles, bandpass.passes);
            touched = true;
        }
        if touched {
            stack.write(target).map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

/// Enumerate `<A>_<B>.<XX>` final products in one event directory, keyed by
/// the pair tag the stack file inherits.
fn final_products(event_dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut products = Vec::new();
    for entry in std::fs::read_dir(event_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if PairName::is_final_product(name) {
                products.push((name.to_string(), entry.path()));
            }
        }
    }
    products.sort();
    Ok(products)
}
