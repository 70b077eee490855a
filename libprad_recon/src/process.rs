use std::sync::mpsc::Sender;
use std::sync::Arc;

use super::config::Config;
use super::error::ProcessorError;
use super::event::{read_event_file, RawEvent, ReconEvent, ReconOutput};
use super::gem::apv::PedestalAccumulator;
use super::hycal::profile::ClusterProfile;
use super::reconstructor::EventReconstructor;
use super::worker_status::{BarColor, WorkerStatus};

// Fraction of a subset between two progress messages
const FLUSH_FRAC: f32 = 0.01;

// Sends progress at most every FLUSH_FRAC of the subset
struct ProgressReporter<'a> {
    tx: &'a Sender<WorkerStatus>,
    run_number: i32,
    worker_id: usize,
    color: BarColor,
    total: usize,
    flush_val: usize,
    count: usize,
}

impl<'a> ProgressReporter<'a> {
    fn new(
        tx: &'a Sender<WorkerStatus>,
        run_number: i32,
        worker_id: usize,
        color: BarColor,
        total: usize,
    ) -> Self {
        Self {
            tx,
            run_number,
            worker_id,
            color,
            total,
            flush_val: ((total as f32 * FLUSH_FRAC) as usize).max(1),
            count: 0,
        }
    }

    fn send(&self, done: usize) -> Result<(), ProcessorError> {
        let progress = if self.total == 0 {
            1.0
        } else {
            done as f32 / self.total as f32
        };
        self.tx.send(WorkerStatus::new(
            progress,
            self.run_number,
            self.worker_id,
            done,
            self.color,
        ))?;
        Ok(())
    }

    fn event_done(&mut self, done: usize) -> Result<(), ProcessorError> {
        self.count += 1;
        if self.count >= self.flush_val {
            self.count = 0;
            self.send(done)?;
        }
        Ok(())
    }
}

/// Reconstruct a subset of the events (indices into `events`).
///
/// This is the body of one worker thread; the worker owns its reconstructor.
pub fn process_subset(
    events: Arc<Vec<RawEvent>>,
    subset: Vec<usize>,
    mut recon: EventReconstructor,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
    run_number: i32,
) -> Result<Vec<ReconEvent>, ProcessorError> {
    let mut reporter =
        ProgressReporter::new(&tx, run_number, worker_id, BarColor::CYAN, subset.len());
    reporter.send(0)?;
    let mut results = Vec::with_capacity(subset.len());
    for (done, idx) in subset.into_iter().enumerate() {
        let event = &events[idx];
        let result = recon.reconstruct(event);
        if result.overflow.total() > 0 {
            spdlog::info!(
                "Event {} exceeded the hit capacity: {:?}",
                event.event_number,
                result.overflow
            );
        }
        results.push(result);
        reporter.event_done(done + 1)?;
    }
    reporter.send(results.len())?;
    Ok(results)
}

/// Accumulate pedestals over a subset of the events of a pedestal run
pub fn accumulate_subset(
    events: Arc<Vec<RawEvent>>,
    subset: Vec<usize>,
    recon: EventReconstructor,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
    run_number: i32,
) -> Result<PedestalAccumulator, ProcessorError> {
    let total = subset.len();
    let mut reporter = ProgressReporter::new(&tx, run_number, worker_id, BarColor::MAGENTA, total);
    reporter.send(0)?;
    let mut accumulator = PedestalAccumulator::default();
    for (done, idx) in subset.into_iter().enumerate() {
        recon.accumulate_pedestal(&events[idx], &mut accumulator);
        reporter.event_done(done + 1)?;
    }
    reporter.send(total)?;
    Ok(accumulator)
}

/// Divide the events into a set of subsets (per thread/worker), round robin
pub fn create_subsets(n_events: usize, n_threads: usize) -> Vec<Vec<usize>> {
    let mut subsets: Vec<Vec<usize>> = vec![Vec::new(); n_threads.max(1)];
    let n_subsets = subsets.len();

    for idx in 0..n_events {
        subsets[idx % n_subsets].push(idx)
    }

    // no idle workers
    subsets.retain(|s| !s.is_empty());
    subsets
}

fn join_all<T>(
    handles: Vec<std::thread::JoinHandle<Result<T, ProcessorError>>>,
) -> Result<Vec<T>, ProcessorError> {
    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.join() {
            Ok(result) => results.push(result?),
            Err(_) => {
                spdlog::error!("An error occured joining one of the workers!");
                return Err(ProcessorError::WorkerPanic);
            }
        }
    }
    Ok(results)
}

/// The main loop of prad_recon.
///
/// This takes in a config (and progress monitor), reconstructs every event of the event
/// file with a pool of workers and writes the results (or the pedestal table of a pedestal
/// run) to the output path.
pub fn process(config: Config, tx: Sender<WorkerStatus>) -> Result<(), ProcessorError> {
    if !config.is_n_threads_valid() {
        return Err(ProcessorError::BadWorkerCount(config.n_threads));
    }

    let (recon_config, warnings) = config.load_recon_config()?;
    if !warnings.is_empty() {
        spdlog::warn!(
            "{} reconstruction settings were replaced by their defaults",
            warnings.len()
        );
    }
    let coords = config.load_coords()?;
    spdlog::info!(
        "Using detector coordinates of run {} for run {}",
        coords.run_number(),
        config.run_number
    );
    let pedestals = Arc::new(config.load_pedestals()?);
    spdlog::info!("Loaded {} GEM strip pedestals", pedestals.len());
    let calibs = config.load_calib()?;
    let profile = Arc::new(ClusterProfile::prad());

    let file_size = std::fs::metadata(&config.event_path)
        .map(|m| m.len())
        .unwrap_or(0);
    spdlog::info!(
        "Reading event file {} ({})",
        config.event_path.to_string_lossy(),
        human_bytes::human_bytes(file_size as f64)
    );
    let events = Arc::new(read_event_file(&config.event_path)?);
    spdlog::info!("Read {} events", events.len());

    let subsets = create_subsets(events.len(), config.n_threads as usize);
    let mut recon = EventReconstructor::new(&recon_config, profile, coords, pedestals);
    let n_calib = recon.hycal_mut().apply_calib(&calibs);
    spdlog::info!("Applied {} of {} HyCal module calibrations", n_calib, calibs.len());

    if config.pedestal_run {
        let mut handles = Vec::new();
        for (worker_id, subset) in subsets.into_iter().enumerate() {
            let (events, recon, tx) = (events.clone(), recon.clone(), tx.clone());
            let run_number = config.run_number;
            handles.push(std::thread::spawn(move || {
                accumulate_subset(events, subset, recon, tx, worker_id, run_number)
            }));
        }
        let mut accumulator = PedestalAccumulator::default();
        for partial in join_all(handles)? {
            accumulator.merge(partial);
        }
        let table = accumulator.finish();
        table.write_file(&config.output_path)?;
        spdlog::info!(
            "Wrote {} pedestals to {}",
            table.len(),
            config.output_path.to_string_lossy()
        );
        return Ok(());
    }

    let mut handles = Vec::new();
    for (worker_id, subset) in subsets.into_iter().enumerate() {
        let (events, recon, tx) = (events.clone(), recon.clone(), tx.clone());
        let run_number = config.run_number;
        handles.push(std::thread::spawn(move || {
            process_subset(events, subset, recon, tx, worker_id, run_number)
        }));
    }
    let mut results: Vec<ReconEvent> = join_all(handles)?.into_iter().flatten().collect();
    results.sort_by_key(|e| e.event_number);

    let n_events = results.len();
    ReconOutput::new(config.run_number, results)?.write_file(&config.output_path)?;
    spdlog::info!(
        "Wrote {} reconstructed events to {}",
        n_events,
        config.output_path.to_string_lossy()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ModuleEnergy;
    use crate::gem::apv::PedestalTable;
    use std::sync::mpsc;

    #[test]
    fn test_create_subsets() {
        let subsets = create_subsets(7, 3);
        assert_eq!(subsets, vec![vec![0, 3, 6], vec![1, 4], vec![2, 5]]);
        // more workers than events
        assert_eq!(create_subsets(2, 4).len(), 2);
        assert!(create_subsets(0, 2).is_empty());
    }

    fn write_events(path: &std::path::Path) {
        let events: Vec<RawEvent> = (0..10)
            .map(|n| RawEvent {
                event_number: n,
                modules: vec![ModuleEnergy {
                    id: 1351,
                    energy: 500.0 + n as f32,
                }],
                gem: Vec::new(),
            })
            .collect();
        std::fs::write(path, serde_yaml::to_string(&events).unwrap()).unwrap();
    }

    #[test]
    fn test_process_orders_events() {
        let dir = std::env::temp_dir();
        let event_path = dir.join("prad_recon_process_events.yaml");
        let output_path = dir.join("prad_recon_process_output.yaml");
        let calib_path = dir.join("prad_recon_process_calib.yaml");
        write_events(&event_path);
        std::fs::write(
            &calib_path,
            "- { id: 1351, base_energy: 1000.0, non_linear: 0.05 }\n",
        )
        .unwrap();
        let config = Config {
            event_path: event_path.clone(),
            output_path: output_path.clone(),
            calib_path: Some(calib_path.clone()),
            run_number: 1288,
            n_threads: 3,
            ..Default::default()
        };
        let (tx, rx) = mpsc::channel();
        process(config, tx).unwrap();
        let statuses: Vec<WorkerStatus> = rx.try_iter().collect();
        assert!(statuses.iter().any(|s| s.progress == 1.0));

        let output = ReconOutput::read_file(&output_path).unwrap();
        std::fs::remove_file(&event_path).unwrap();
        std::fs::remove_file(&output_path).unwrap();
        std::fs::remove_file(&calib_path).unwrap();
        assert_eq!(output.run_number, 1288);
        let numbers: Vec<u64> = output.events.iter().map(|e| e.event_number).collect();
        assert_eq!(numbers, (0..10).collect::<Vec<u64>>());
        assert!(output.events.iter().all(|e| e.hycal_hits.len() == 1));
        // below the base energy the correction raises the energy
        assert!(output.events.iter().all(|e| e.hycal_hits[0].lin_corr > 1.0));
    }

    #[test]
    fn test_pedestal_run() {
        let dir = std::env::temp_dir();
        let event_path = dir.join("prad_recon_pedestal_events.yaml");
        let output_path = dir.join("prad_recon_pedestal_output.yaml");
        let yaml_str = "
- event_number: 0
  gem: [{ detector: Gem2, plane: Y, strip: 12, samples: [100.0, 102.0] }]
- event_number: 1
  gem: [{ detector: Gem2, plane: Y, strip: 12, samples: [98.0, 100.0] }]
";
        std::fs::write(&event_path, yaml_str).unwrap();
        let config = Config {
            event_path: event_path.clone(),
            output_path: output_path.clone(),
            pedestal_run: true,
            n_threads: 2,
            ..Default::default()
        };
        let (tx, _rx) = mpsc::channel();
        process(config, tx).unwrap();
        let table = PedestalTable::read_file(&output_path).unwrap();
        std::fs::remove_file(&event_path).unwrap();
        std::fs::remove_file(&output_path).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_bad_worker_count() {
        let config = Config {
            n_threads: 0,
            ..Default::default()
        };
        let (tx, _rx) = mpsc::channel();
        assert!(matches!(
            process(config, tx),
            Err(ProcessorError::BadWorkerCount(0))
        ));
    }
}
