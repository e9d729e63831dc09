use std::fmt;

#[derive(Debug, Clone)]
pub enum ClickflowError {
    Config(String),
    DatabaseConfig(String),
    DatabaseConnection(String),
    DatabaseOperation(String),
    DedupStore(String),
    QueueTransport(String),
    InvalidJob(String),
    JobTimeout(String),
    Validation(String),
    Serialization(String),
    DateParse(String),
    FileOperation(String),
    Worker(String),
}

impl ClickflowError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            ClickflowError::Config(_) => "E001",
            ClickflowError::DatabaseConfig(_) => "E002",
            ClickflowError::DatabaseConnection(_) => "E003",
            ClickflowError::DatabaseOperation(_) => "E004",
            ClickflowError::DedupStore(_) => "E005",
            ClickflowError::QueueTransport(_) => "E006",
            ClickflowError::InvalidJob(_) => "E007",
            ClickflowError::JobTimeout(_) => "E008",
            ClickflowError::Validation(_) => "E009",
            ClickflowError::Serialization(_) => "E010",
            ClickflowError::DateParse(_) => "E011",
            ClickflowError::FileOperation(_) => "E012",
            ClickflowError::Worker(_) => "E013",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            ClickflowError::Config(_) => "Configuration Error",
            ClickflowError::DatabaseConfig(_) => "Database Configuration Error",
            ClickflowError::DatabaseConnection(_) => "Database Connection Error",
            ClickflowError::DatabaseOperation(_) => "Database Operation Error",
            ClickflowError::DedupStore(_) => "Dedup Store Error",
            ClickflowError::QueueTransport(_) => "Queue Transport Error",
            ClickflowError::InvalidJob(_) => "Invalid Job Payload",
            ClickflowError::JobTimeout(_) => "Job Timeout",
            ClickflowError::Validation(_) => "Validation Error",
            ClickflowError::Serialization(_) => "Serialization Error",
            ClickflowError::DateParse(_) => "Date Parse Error",
            ClickflowError::FileOperation(_) => "File Operation Error",
            ClickflowError::Worker(_) => "Worker Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            ClickflowError::Config(msg) => msg,
            ClickflowError::DatabaseConfig(msg) => msg,
            ClickflowError::DatabaseConnection(msg) => msg,
            ClickflowError::DatabaseOperation(msg) => msg,
            ClickflowError::DedupStore(msg) => msg,
            ClickflowError::QueueTransport(msg) => msg,
            ClickflowError::InvalidJob(msg) => msg,
            ClickflowError::JobTimeout(msg) => msg,
            ClickflowError::Validation(msg) => msg,
            ClickflowError::Serialization(msg) => msg,
            ClickflowError::DateParse(msg) => msg,
            ClickflowError::FileOperation(msg) => msg,
            ClickflowError::Worker(msg) => msg,
        }
    }

    /// 队列是否应该重新投递该任务
    ///
    /// 数据本身有问题的任务重试也不会成功，直接进入死信队列。
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ClickflowError::InvalidJob(_)
                | ClickflowError::Validation(_)
                | ClickflowError::Serialization(_)
                | ClickflowError::DateParse(_)
        )
    }

    /// 格式化为彩色输出（用于终端）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出（用于日志）
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for ClickflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for ClickflowError {}

// 便捷的构造函数
impl ClickflowError {
    pub fn config<T: Into<String>>(msg: T) -> Self {
        ClickflowError::Config(msg.into())
    }

    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        ClickflowError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        ClickflowError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        ClickflowError::DatabaseOperation(msg.into())
    }

    pub fn dedup_store<T: Into<String>>(msg: T) -> Self {
        ClickflowError::DedupStore(msg.into())
    }

    pub fn queue_transport<T: Into<String>>(msg: T) -> Self {
        ClickflowError::QueueTransport(msg.into())
    }

    pub fn invalid_job<T: Into<String>>(msg: T) -> Self {
        ClickflowError::InvalidJob(msg.into())
    }

    pub fn job_timeout<T: Into<String>>(msg: T) -> Self {
        ClickflowError::JobTimeout(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        ClickflowError::Validation(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        ClickflowError::Serialization(msg.into())
    }

    pub fn date_parse<T: Into<String>>(msg: T) -> Self {
        ClickflowError::DateParse(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        ClickflowError::FileOperation(msg.into())
    }

    pub fn worker<T: Into<String>>(msg: T) -> Self {
        ClickflowError::Worker(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<sea_orm::DbErr> for ClickflowError {
    fn from(err: sea_orm::DbErr) -> Self {
        ClickflowError::DatabaseOperation(err.to_string())
    }
}

impl From<redis::RedisError> for ClickflowError {
    fn from(err: redis::RedisError) -> Self {
        ClickflowError::QueueTransport(err.to_string())
    }
}

impl From<std::io::Error> for ClickflowError {
    fn from(err: std::io::Error) -> Self {
        ClickflowError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for ClickflowError {
    fn from(err: serde_json::Error) -> Self {
        ClickflowError::Serialization(err.to_string())
    }
}

impl From<chrono::ParseError> for ClickflowError {
    fn from(err: chrono::ParseError) -> Self {
        ClickflowError::DateParse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClickflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_unique() {
        let errors = [
            ClickflowError::config(""),
            ClickflowError::database_config(""),
            ClickflowError::database_connection(""),
            ClickflowError::database_operation(""),
            ClickflowError::dedup_store(""),
            ClickflowError::queue_transport(""),
            ClickflowError::invalid_job(""),
            ClickflowError::job_timeout(""),
            ClickflowError::validation(""),
            ClickflowError::serialization(""),
            ClickflowError::date_parse(""),
            ClickflowError::file_operation(""),
            ClickflowError::worker(""),
        ];
        let mut codes: Vec<&str> = errors.iter().map(|e| e.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ClickflowError::dedup_store("redis down").is_retryable());
        assert!(ClickflowError::database_operation("deadlock").is_retryable());
        assert!(ClickflowError::job_timeout("30s").is_retryable());
        assert!(!ClickflowError::invalid_job("missing url_id").is_retryable());
        assert!(!ClickflowError::date_parse("bad timestamp").is_retryable());
    }

    #[test]
    fn test_display_uses_simple_format() {
        let err = ClickflowError::dedup_store("connection refused");
        assert_eq!(err.to_string(), "Dedup Store Error: connection refused");
    }
}
