use conductor_core::{
    Command, CommandEnvelope, CommandId, GameContent, PlatformId, SessionState, TrainId,
    TrainStatus,
};
use serde::{Deserialize, Serialize};

pub trait CommandSource {
    fn generate_commands(
        &mut self,
        state: &SessionState,
        content: &GameContent,
        next_command_id: &mut u64,
    ) -> Vec<CommandEnvelope>;
}

/// Allocates a command ID and builds a `CommandEnvelope` for the current tick.
fn make_cmd(tick: u64, next_id: &mut u64, command: Command) -> CommandEnvelope {
    let cmd_id = CommandId(format!("cmd_{:06}", *next_id));
    *next_id += 1;
    CommandEnvelope {
        id: cmd_id,
        issued_tick: tick,
        execute_at_tick: tick,
        command,
    }
}

/// Operator policies selectable from the CLI and daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorKind {
    Auto,
    Idle,
}

impl std::str::FromStr for OperatorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "idle" => Ok(Self::Idle),
            other => Err(format!("unknown operator '{other}' (expected auto|idle)")),
        }
    }
}

/// Builds the policy for `kind`. `react_at` only affects [`AutoDispatcher`].
pub fn operator_for(kind: OperatorKind, react_at: u32) -> Box<dyn CommandSource + Send> {
    match kind {
        OperatorKind::Auto => Box::new(AutoDispatcher::new(react_at)),
        OperatorKind::Idle => Box::new(IdleOperator),
    }
}

/// Sends requesting trains to free platforms:
/// 1. The countdown owner, once its countdown is at or below `react_at_seconds_left`.
/// 2. Queued requests, oldest first. They carry no countdown.
///
/// Each train gets a distinct free platform, lowest number first. With no free
/// platform the train is left waiting; the policy never causes a collision.
#[derive(Debug, Clone)]
pub struct AutoDispatcher {
    pub react_at_seconds_left: u32,
}

impl AutoDispatcher {
    pub fn new(react_at_seconds_left: u32) -> Self {
        Self {
            react_at_seconds_left,
        }
    }

    /// Assigns on the first tick a countdown is visible.
    pub fn immediate(content: &GameContent) -> Self {
        Self::new(content.constants.countdown_secs)
    }

    fn ready_trains(&self, state: &SessionState) -> Vec<TrainId> {
        let mut ready: Vec<TrainId> = state
            .request_queue
            .iter()
            .filter(|id| {
                state
                    .train(id)
                    .is_some_and(|t| t.status == TrainStatus::Requesting)
            })
            .cloned()
            .collect();
        if let Some(countdown) = &state.countdown {
            if countdown.seconds_left <= self.react_at_seconds_left {
                ready.insert(0, countdown.train_id.clone());
            }
        }
        ready
    }
}

impl Default for AutoDispatcher {
    fn default() -> Self {
        Self::new(8)
    }
}

impl CommandSource for AutoDispatcher {
    fn generate_commands(
        &mut self,
        state: &SessionState,
        _content: &GameContent,
        next_command_id: &mut u64,
    ) -> Vec<CommandEnvelope> {
        if state.is_over() || state.is_paused() {
            return Vec::new();
        }
        let free: Vec<PlatformId> = state.platforms.list_available();
        self.ready_trains(state)
            .into_iter()
            .zip(free)
            .map(|(train_id, platform)| {
                make_cmd(
                    state.meta.tick,
                    next_command_id,
                    Command::Assign { train_id, platform },
                )
            })
            .collect()
    }
}

/// Never acts. Every session it watches ends in a timeout or overload.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleOperator;

impl CommandSource for IdleOperator {
    fn generate_commands(
        &mut self,
        _state: &SessionState,
        _content: &GameContent,
        _next_command_id: &mut u64,
    ) -> Vec<CommandEnvelope> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::test_fixtures::{
        base_content, base_state, insert_train, make_rng, requesting_train, run_ticks,
    };
    use conductor_core::{assign, pause};

    fn assigned(commands: &[CommandEnvelope]) -> Vec<(TrainId, PlatformId)> {
        commands
            .iter()
            .filter_map(|cmd| match &cmd.command {
                Command::Assign { train_id, platform } => Some((train_id.clone(), *platform)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_auto_dispatcher_waits_until_threshold() {
        let content = base_content();
        let mut state = base_state(&content);
        let mut rng = make_rng();
        let comet = requesting_train(&mut state, &content, &mut rng, "Comet Mu");

        let mut dispatcher = AutoDispatcher::new(5);
        let mut next_id = 0u64;
        assert!(dispatcher
            .generate_commands(&state, &content, &mut next_id)
            .is_empty());

        run_ticks(&mut state, &content, &mut rng, 30);
        assert_eq!(state.countdown_seconds(), Some(5));
        let commands = dispatcher.generate_commands(&state, &content, &mut next_id);
        assert_eq!(assigned(&commands), vec![(comet, PlatformId(1))]);
        assert_eq!(commands[0].id.0, "cmd_000000");
        assert_eq!(next_id, 1);
    }

    #[test]
    fn test_auto_dispatcher_uses_distinct_free_platforms() {
        let content = base_content();
        let mut state = base_state(&content);
        let mut rng = make_rng();
        let thunder = requesting_train(&mut state, &content, &mut rng, "Thunder Zeta");
        let silver = requesting_train(&mut state, &content, &mut rng, "Silver Arrow");
        let owl = requesting_train(&mut state, &content, &mut rng, "Night Owl");
        let mut events = Vec::new();
        assign(&mut state, &thunder, PlatformId(1), &content, &mut rng, &mut events).unwrap();
        // Silver Arrow now owns the countdown; Night Owl is queued.

        let mut dispatcher = AutoDispatcher::immediate(&content);
        let mut next_id = 0u64;
        let commands = dispatcher.generate_commands(&state, &content, &mut next_id);

        assert_eq!(
            assigned(&commands),
            vec![(silver, PlatformId(2)), (owl, PlatformId(3))]
        );
    }

    #[test]
    fn test_auto_dispatcher_sends_queued_trains_before_owner_threshold() {
        let content = base_content();
        let mut state = base_state(&content);
        let mut rng = make_rng();
        let comet = requesting_train(&mut state, &content, &mut rng, "Comet Mu");
        let owl = requesting_train(&mut state, &content, &mut rng, "Night Owl");

        let mut dispatcher = AutoDispatcher::new(5);
        let mut next_id = 0u64;
        let commands = dispatcher.generate_commands(&state, &content, &mut next_id);
        assert_eq!(assigned(&commands), vec![(owl.clone(), PlatformId(1))]);

        run_ticks(&mut state, &content, &mut rng, 30);
        assert_eq!(state.countdown_seconds(), Some(5));
        let commands = dispatcher.generate_commands(&state, &content, &mut next_id);
        assert_eq!(
            assigned(&commands),
            vec![(comet, PlatformId(1)), (owl, PlatformId(2))]
        );
    }

    #[test]
    fn test_auto_dispatcher_leaves_train_waiting_when_station_full() {
        let content = base_content();
        let mut state = base_state(&content);
        let mut rng = make_rng();
        let mut events = Vec::new();
        let arrivals = [
            (1, "Thunder Zeta"),
            (2, "Comet Mu"),
            (3, "Silver Arrow"),
            (4, "Night Owl"),
        ];
        for (platform, name) in arrivals {
            let id = requesting_train(&mut state, &content, &mut rng, name);
            assign(&mut state, &id, PlatformId(platform), &content, &mut rng, &mut events).unwrap();
        }
        requesting_train(&mut state, &content, &mut rng, "Iron Horse");

        let mut dispatcher = AutoDispatcher::immediate(&content);
        let mut next_id = 0u64;
        assert!(dispatcher
            .generate_commands(&state, &content, &mut next_id)
            .is_empty());
    }

    #[test]
    fn test_auto_dispatcher_ignores_approaching_trains() {
        let content = base_content();
        let mut state = base_state(&content);
        insert_train(&mut state, "Red Kite");

        let mut dispatcher = AutoDispatcher::immediate(&content);
        let mut next_id = 0u64;
        assert!(dispatcher
            .generate_commands(&state, &content, &mut next_id)
            .is_empty());
    }

    #[test]
    fn test_auto_dispatcher_silent_while_paused() {
        let content = base_content();
        let mut state = base_state(&content);
        let mut rng = make_rng();
        requesting_train(&mut state, &content, &mut rng, "Red Kite");
        let mut events = Vec::new();
        pause(&mut state, &mut events).unwrap();

        let mut dispatcher = AutoDispatcher::immediate(&content);
        let mut next_id = 0u64;
        assert!(dispatcher
            .generate_commands(&state, &content, &mut next_id)
            .is_empty());
    }

    #[test]
    fn test_operator_kind_parses() {
        assert_eq!("auto".parse::<OperatorKind>(), Ok(OperatorKind::Auto));
        assert_eq!("idle".parse::<OperatorKind>(), Ok(OperatorKind::Idle));
        assert!("reckless".parse::<OperatorKind>().is_err());
    }
}
