/// Progress message sent by the processing thread after each exposure
#[derive(Debug, Clone, Default)]
pub struct RunStatus {
    pub progress: f32,
    pub frames_done: usize,
    pub frames_total: usize,
    pub current_file: String,
}

impl RunStatus {
    pub fn new(frames_done: usize, frames_total: usize, current_file: String) -> Self {
        let progress = if frames_total == 0 {
            1.0
        } else {
            frames_done as f32 / frames_total as f32
        };
        Self {
            progress,
            frames_done,
            frames_total,
            current_file,
        }
    }
}
