pub mod channel_function;
pub mod channel_parser;
pub mod config;
pub mod console;
pub mod error;
pub mod function_map;
pub mod ipx800_cmd_regex;
pub mod ipx800_model;
pub mod logger;
pub mod mock_controller;
pub mod poller;
pub mod ports;
pub mod roof_controller;
pub mod status;
