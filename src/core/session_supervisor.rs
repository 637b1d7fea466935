//! 会话监管：驱动任务与取消令牌
//!
//! 每个会话同一时刻至多一个驱动任务。暂停 / 停止 / 重置时取消当前令牌，
//! 进行中的后端调用与节奏等待立即放弃；恢复或推进时换一枚新令牌重新挂载驱动任务。

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct SessionSupervisor {
    /// 当前驱动任务的运行令牌
    run_token: CancellationToken,
    driver: Option<JoinHandle<()>>,
}

impl SessionSupervisor {
    pub fn new() -> Self {
        let run_token = CancellationToken::new();
        // 新会话尚未挂载驱动
        run_token.cancel();
        Self {
            run_token,
            driver: None,
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.run_token.clone()
    }

    /// 取消当前驱动（暂停 / 停止 / 重置）
    pub fn cancel(&self) {
        self.run_token.cancel();
    }

    /// 是否有仍在运行、且未被取消的驱动任务
    pub fn is_driving(&self) -> bool {
        !self.run_token.is_cancelled()
            && self.driver.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// 取消旧令牌并换一枚新的，返回给即将启动的驱动任务
    pub fn rearm(&mut self) -> CancellationToken {
        self.run_token.cancel();
        self.run_token = CancellationToken::new();
        self.run_token.clone()
    }

    pub fn attach(&mut self, driver: JoinHandle<()>) {
        self.driver = Some(driver);
    }
}

impl Default for SessionSupervisor {
    fn default() -> Self {
        Self::new()
    }
}
