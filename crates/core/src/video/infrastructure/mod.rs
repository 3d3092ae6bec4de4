pub mod ffmpeg_source;
pub mod ffmpeg_writer;
pub mod image_file_writer;
