pub mod blob_segmenter;
pub mod candidate_scorer;
pub mod color;
pub mod color_tagger;
pub mod deduplicator;
pub mod fish_detector;
pub mod model_output;
pub mod preprocessor;
