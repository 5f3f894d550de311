use crate::profiles::Profile;

/// 시작 직후 이름/활성 프로필 탐색 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    Polling,
    /// 종료 상태. 다시 Polling으로 돌아가지 않는다.
    Settled { active: Profile },
}

/// 폴링 한 번의 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// 실제 이름이 아직 없음
    AwaitingNames,
    /// 이름은 있지만 활성 프로필을 못 읽음
    AwaitingActive,
    /// 이번 틱에서 Settled로 전이
    Settled(Profile),
    /// 이미 Settled
    Idle,
}

#[derive(Debug)]
pub struct Discovery {
    state: DiscoveryState,
}

impl Default for Discovery {
    fn default() -> Self {
        Self::new()
    }
}

impl Discovery {
    pub fn new() -> Self {
        Self { state: DiscoveryState::Polling }
    }

    pub fn state(&self) -> DiscoveryState {
        self.state
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.state, DiscoveryState::Settled { .. })
    }

    /// 스크랩/감지 결과를 받아 상태를 진행한다.
    /// `Settled(..)`는 프로세스 수명 동안 정확히 한 번만 나온다.
    pub fn advance(&mut self, names_loaded: bool, active: Option<Profile>) -> TickOutcome {
        if self.is_settled() {
            return TickOutcome::Idle;
        }
        if !names_loaded {
            return TickOutcome::AwaitingNames;
        }
        match active {
            None => TickOutcome::AwaitingActive,
            Some(profile) => {
                self.state = DiscoveryState::Settled { active: profile };
                TickOutcome::Settled(profile)
            }
        }
    }
}
