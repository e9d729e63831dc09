//! HTTP 接口
//!
//! - POST /api/log：同步写入
//! - GET /api/stats/{url_id}：单链接统计
//! - GET /health/live, /health/ready

pub mod services;

pub use services::{ApiSettings, api_routes, health_routes};
