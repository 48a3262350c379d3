pub mod booth;
pub mod camera;
pub mod capture;
pub mod config;
pub mod control;
pub mod delivery;
pub mod filters;
pub mod font;
pub mod gate;
pub mod gesture;
pub mod http;
pub mod inference;
pub mod landmarks;
pub mod output;
pub mod overlay;
pub mod session;
pub mod shutdown;
pub mod storage;
pub mod supervisor;
pub mod ttf;
pub mod types;
