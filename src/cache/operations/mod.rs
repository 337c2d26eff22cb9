/// 缓存操作
/// 提供缓存操作的功能实现，所有操作都通过注入的 `CacheStore` 访问后端

// 会话缓存操作
pub mod session;

// 刷新令牌缓存操作
pub mod token;

// 限流与登录尝试计数
pub mod login_attempt;
pub mod rate_limit;

// 用户资料缓存操作
pub mod user;

// 维护与健康检查
pub mod health;
pub mod maintenance;

// 重新导出常用操作
pub use health::HealthCacheOperations;
pub use login_attempt::LoginAttemptOperations;
pub use maintenance::{MaintenanceOperations, MaintenanceReport, MaintenanceWorker, SweepStats};
pub use rate_limit::RateLimitCacheOperations;
pub use session::SessionCacheOperations;
pub use token::TokenCacheOperations;
pub use user::UserCacheOperations;
