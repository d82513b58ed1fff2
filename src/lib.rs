pub mod console_display;
pub mod coordinator;
pub mod data_logger;
pub mod error;
pub mod frame_analyzer;
pub mod frame_source;
pub mod image_io;
pub mod pacing;
pub mod pitch;
pub mod sheet_composer;
pub mod simulator;
pub mod slice_map;
pub mod types;
pub mod visualizer;
