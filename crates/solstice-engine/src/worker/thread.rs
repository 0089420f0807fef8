use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::error::ConfigurationError;
use crate::render::{RenderContext, RenderSettings};

use super::{FrameRenderer, RenderJob, WorkerMessage};

const THREAD_NAME: &str = "render-worker";

/// Handle to the running worker thread.
///
/// The thread stops once this handle and every sender obtained from
/// [`RenderWorker::sender`] have been dropped.
pub struct RenderWorker {
    jobs: mpsc::Sender<RenderJob>,
    handle: JoinHandle<()>,
}

impl RenderWorker {
    /// Starts the worker with a real GPU render context built from `settings`.
    pub fn spawn_context(
        settings: RenderSettings,
    ) -> std::io::Result<(Self, UnboundedReceiver<WorkerMessage>)> {
        Self::spawn(move || pollster::block_on(RenderContext::create(&settings)))
    }

    /// Starts the worker thread. `init` runs on that thread, so the renderer
    /// it returns never needs to be `Send`.
    pub fn spawn<R, F>(init: F) -> std::io::Result<(Self, UnboundedReceiver<WorkerMessage>)>
    where
        R: FrameRenderer,
        F: FnOnce() -> Result<R, ConfigurationError> + Send + 'static,
    {
        let (jobs_tx, jobs_rx) = mpsc::channel();
        let (events_tx, events_rx) = unbounded_channel();

        let handle = thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || worker_main(init, jobs_rx, events_tx))?;

        Ok((
            Self {
                jobs: jobs_tx,
                handle,
            },
            events_rx,
        ))
    }

    /// A sender for submitting jobs. Jobs are rendered in the order they are sent.
    pub fn sender(&self) -> mpsc::Sender<RenderJob> {
        self.jobs.clone()
    }

    /// Drops this handle's sender and waits for the thread to finish.
    ///
    /// Blocks until every other sender is gone as well.
    pub fn join(self) -> thread::Result<()> {
        drop(self.jobs);
        self.handle.join()
    }
}

fn worker_main<R, F>(init: F, jobs: mpsc::Receiver<RenderJob>, events: UnboundedSender<WorkerMessage>)
where
    R: FrameRenderer,
    F: FnOnce() -> Result<R, ConfigurationError>,
{
    log::info!("render worker starting");

    let mut renderer = match init() {
        Ok(renderer) => renderer,
        Err(error) => {
            log::error!("render worker initialization failed: {error}");
            let _ = events.send(WorkerMessage::Failed { error });
            return;
        }
    };

    log::info!("render worker ready");
    if events.send(WorkerMessage::Ready).is_err() {
        return;
    }

    while let Ok(job) = jobs.recv() {
        log::debug!(
            "rendering job {} (lat {}, lon {})",
            job.id,
            job.latitude_degrees,
            job.longitude_degrees
        );

        let message = match renderer.render_frame(job.sun()) {
            Ok(pixels) => WorkerMessage::Rendered { id: job.id, pixels },
            Err(error) => {
                log::error!("job {} failed: {error}", job.id);
                WorkerMessage::JobFailed { id: job.id, error }
            }
        };

        if events.send(message).is_err() {
            log::debug!("result receiver closed");
            break;
        }
    }

    log::info!("render worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{SunDirection, Viewport};
    use crate::error::RenderError;
    use crate::render::{PixelBuffer, ShaderSource};

    /// Encodes the sun's x component into every red byte.
    struct FakeRenderer {
        viewport: Viewport,
        frames: u32,
        fail_on: Option<u32>,
    }

    impl FakeRenderer {
        fn new() -> Self {
            Self {
                viewport: Viewport::from_width(4).unwrap(),
                frames: 0,
                fail_on: None,
            }
        }
    }

    impl FrameRenderer for FakeRenderer {
        fn render_frame(&mut self, sun: SunDirection) -> Result<PixelBuffer, RenderError> {
            self.frames += 1;
            if self.fail_on == Some(self.frames) {
                return Err(RenderError::Poll("device lost".into()));
            }
            let red = ((sun.vector().x + 1.0) * 127.5).round() as u8;
            let data = [red, 0, 0, 255].repeat(self.viewport.rgba_len() / 4);
            PixelBuffer::from_rgba8(self.viewport, data)
        }
    }

    fn rendered_id(message: WorkerMessage) -> u64 {
        match message {
            WorkerMessage::Rendered { id, .. } => id,
            other => panic!("expected a rendered frame, got {other:?}"),
        }
    }

    #[test]
    fn reports_ready_then_renders_in_order() {
        let (worker, mut events) = RenderWorker::spawn(|| Ok(FakeRenderer::new())).unwrap();
        let jobs = worker.sender();
        for id in [7, 3, 11] {
            jobs.send(RenderJob::new(id, 0.0, 0.0)).unwrap();
        }

        assert!(matches!(events.blocking_recv(), Some(WorkerMessage::Ready)));
        let ids: Vec<u64> = (0..3).map(|_| rendered_id(events.blocking_recv().unwrap())).collect();
        assert_eq!(ids, vec![7, 3, 11]);

        drop(jobs);
        worker.join().unwrap();
        assert!(events.blocking_recv().is_none());
    }

    #[test]
    fn frame_reflects_the_job_coordinates() {
        let (worker, mut events) = RenderWorker::spawn(|| Ok(FakeRenderer::new())).unwrap();
        let jobs = worker.sender();
        jobs.send(RenderJob::new(1, 0.0, 0.0)).unwrap();
        jobs.send(RenderJob::new(2, 0.0, 180.0)).unwrap();

        assert!(matches!(events.blocking_recv(), Some(WorkerMessage::Ready)));
        let reds: Vec<u8> = (0..2)
            .map(|_| match events.blocking_recv().unwrap() {
                WorkerMessage::Rendered { pixels, .. } => pixels.as_bytes()[0],
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(reds, vec![255, 0]);
    }

    #[test]
    fn init_failure_is_reported_and_stops_the_thread() {
        let (worker, mut events) = RenderWorker::spawn(|| {
            Err::<FakeRenderer, _>(ConfigurationError::ProgramLink {
                log: "no fs_main".into(),
            })
        })
        .unwrap();

        match events.blocking_recv() {
            Some(WorkerMessage::Failed { error }) => {
                assert_eq!(error, ConfigurationError::ProgramLink { log: "no fs_main".into() });
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(events.blocking_recv().is_none());
        worker.join().unwrap();
    }

    #[test]
    fn a_failed_job_does_not_stop_the_worker() {
        let (worker, mut events) = RenderWorker::spawn(|| {
            Ok(FakeRenderer {
                fail_on: Some(1),
                ..FakeRenderer::new()
            })
        })
        .unwrap();
        let jobs = worker.sender();
        jobs.send(RenderJob::new(1, 0.0, 0.0)).unwrap();
        jobs.send(RenderJob::new(2, 0.0, 0.0)).unwrap();

        assert!(matches!(events.blocking_recv(), Some(WorkerMessage::Ready)));
        assert!(matches!(
            events.blocking_recv(),
            Some(WorkerMessage::JobFailed { id: 1, .. })
        ));
        assert_eq!(rendered_id(events.blocking_recv().unwrap()), 2);
    }

    #[tokio::test]
    async fn results_can_be_awaited_from_async_code() {
        let (worker, mut events) = RenderWorker::spawn(|| Ok(FakeRenderer::new())).unwrap();
        worker.sender().send(RenderJob::new(42, 10.0, 20.0)).unwrap();

        assert!(matches!(events.recv().await, Some(WorkerMessage::Ready)));
        assert_eq!(rendered_id(events.recv().await.unwrap()), 42);
    }

    #[test]
    fn shader_override_that_does_not_fit_the_layout_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let day = dir.path().join("earth_day.png");
        let night = dir.path().join("earth_night.png");
        image::RgbaImage::from_pixel(8, 4, image::Rgba([255, 255, 255, 255])).save(&day).unwrap();
        image::RgbaImage::from_pixel(8, 4, image::Rgba([0, 0, 0, 255])).save(&night).unwrap();

        let mut settings = RenderSettings::new(16, &day, &night);
        settings.fragment_shader = ShaderSource::Inline(
            "@group(0) @binding(1) var<uniform> not_a_texture: vec4<f32>;\n\
             @fragment fn fs_main() -> @location(0) vec4<f32> { return not_a_texture; }"
                .into(),
        );

        let (worker, mut events) = RenderWorker::spawn_context(settings).unwrap();
        match events.blocking_recv() {
            Some(WorkerMessage::Failed { error: ConfigurationError::ProgramLink { log } }) => {
                assert!(log.contains("@binding(1)"), "{log}");
            }
            Some(WorkerMessage::Failed { error: ConfigurationError::Device { reason } }) => {
                eprintln!("skipping GPU test: {reason}");
            }
            other => panic!("expected a link failure, got {other:?}"),
        }
        assert!(events.blocking_recv().is_none());
        assert!(worker.join().is_ok());
    }
}
