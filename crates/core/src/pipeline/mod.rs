pub mod display_sink;
pub mod inference_adapter;
pub mod infrastructure;
pub mod output_delivery;
pub mod pipeline_logger;
pub mod pipeline_run;
pub mod process_video_use_case;
pub mod webcam_session;
