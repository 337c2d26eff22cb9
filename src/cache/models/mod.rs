/// 缓存数据模型
/// 定义缓存数据的结构体

// 会话缓存模型
pub mod session;

// 刷新令牌缓存模型
pub mod token;

// 限流计数模型
pub mod rate_limit;

// 用户资料缓存模型
pub mod user;

// 健康检查与后端统计
pub mod health;

// 重新导出常用类型
pub use health::{BackendStats, HealthReport, HealthStatus};
pub use rate_limit::{RateLimitDecision, RateLimitWindow};
pub use session::CachedSession;
pub use token::CachedRefreshToken;
pub use user::CachedUserProfile;
