/// What a worker is doing, drawn as the color of its progress bar
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BarColor {
    #[default]
    CYAN,
    MAGENTA,
    RED,
}

impl BarColor {
    pub fn label(&self) -> &'static str {
        match self {
            Self::CYAN => "Reconstructing",
            Self::MAGENTA => "Pedestals",
            Self::RED => "Failed",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub run_number: i32,
    pub worker_id: usize,
    pub events_done: usize,
    pub color: BarColor,
}

impl WorkerStatus {
    pub fn new(
        progress: f32,
        run_number: i32,
        worker_id: usize,
        events_done: usize,
        color: BarColor,
    ) -> Self {
        Self {
            progress,
            run_number,
            worker_id,
            events_done,
            color,
        }
    }
}
