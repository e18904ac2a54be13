//! Six-question team registration dialog, one per conversation thread.

use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};

use crate::clock::Calendar;
use crate::error::{BotResult, Conflict, NotFound, StoreError, ValidationError};
use crate::models::Team;
use crate::notify::Notifier;
use crate::sessions::SessionStore;
use crate::store::Store;
use crate::utils::{is_valid_player_id, parse_mentions, parse_team_tag};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    TeamName,
    TeamTag,
    Captain,
    Player2,
    Player3,
    Mentions,
}

impl Step {
    pub fn number(self) -> u8 {
        match self {
            Step::TeamName => 1,
            Step::TeamTag => 2,
            Step::Captain => 3,
            Step::Player2 => 4,
            Step::Player3 => 5,
            Step::Mentions => 6,
        }
    }

    fn next(self) -> Step {
        match self {
            Step::TeamName => Step::TeamTag,
            Step::TeamTag => Step::Captain,
            Step::Captain => Step::Player2,
            Step::Player2 => Step::Player3,
            Step::Player3 | Step::Mentions => Step::Mentions,
        }
    }

    fn question(self) -> &'static str {
        match self {
            Step::TeamName => "**Question 1/6:** What is your **Team Name**?",
            Step::TeamTag => "**Question 2/6:** What is your **Team Tag**? (Format: [ABC], max 6 characters, only letters and numbers)",
            Step::Captain => "**Question 3/6:** Enter **Player 1 (Captain)** details\nFormat: PlayerName#12345678",
            Step::Player2 => "**Question 4/6:** Enter **Player 2** details\nFormat: PlayerName#12345678",
            Step::Player3 => "**Question 5/6:** Enter **Player 3** details\nFormat: PlayerName#12345678",
            Step::Mentions => "**Question 6/6:** Mention your **3 teammates**\nFormat: @user1 @user2 @user3\n(Must mention exactly 3 users)",
        }
    }
}

/// Answers collected so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub name: String,
    pub tag: String,
    pub captain_name: String,
    pub player2_name: String,
    pub player3_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationSession {
    pub owner: i64,
    pub step: Step,
    pub draft: Draft,
    /// The team as it was when an edit started.
    pub editing: Option<Team>,
}

impl RegistrationSession {
    /// Current value shown next to a question while editing.
    fn current(&self, step: Step) -> Option<&str> {
        let team = self.editing.as_ref()?;
        match step {
            Step::TeamName => Some(&team.name),
            Step::TeamTag => Some(&team.tag),
            Step::Captain => Some(&team.captain_name),
            Step::Player2 => Some(&team.player2_name),
            Step::Player3 => Some(&team.player3_name),
            Step::Mentions => None,
        }
    }

    fn prompt(&self, step: Step) -> String {
        match self.current(step) {
            Some(current) => format!("{} (Current: {})", step.question(), current),
            None => step.question().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationReply {
    /// `text` asks the question for `step`, after acknowledging the answer or
    /// saying why the dialog went back.
    Prompt { step: Step, text: String },
    Completed { team: Team, edited: bool, text: String },
}

pub struct Registrar {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    calendar: Calendar,
    sessions: SessionStore<u64, RegistrationSession>,
    verified_role: String,
    archive_delay: Duration,
}

impl Registrar {
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        calendar: Calendar,
        sessions: SessionStore<u64, RegistrationSession>,
        verified_role: String,
        archive_delay: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            calendar,
            sessions,
            verified_role,
            archive_delay,
        }
    }

    pub fn session(&self, conversation: u64) -> Option<RegistrationSession> {
        self.sessions.get(&conversation)
    }

    /// Rejects users who already belong to a team, before anything is created.
    pub async fn ensure_can_register(&self, user: i64) -> BotResult<()> {
        match self.store.team_by_member(user).await? {
            Some(_) => Err(Conflict::AlreadyOnTeam.into()),
            None => Ok(()),
        }
    }

    /// Starts a fresh dialog in `conversation`; returns the greeting.
    pub async fn open_registration(&self, conversation: u64, user: i64) -> BotResult<String> {
        self.ensure_can_register(user).await?;
        let session = RegistrationSession {
            owner: user,
            step: Step::TeamName,
            draft: Draft::default(),
            editing: None,
        };
        let greeting = format!(
            "👋 Hi <@{}>! Let's register your team.\n\n{}",
            user,
            session.prompt(Step::TeamName)
        );
        self.sessions.put(conversation, session);
        Ok(greeting)
    }

    /// The team `user` may edit: their own, if they captain it or are an admin.
    pub async fn prepare_edit(&self, user: i64, is_admin: bool) -> BotResult<Team> {
        let team = self
            .store
            .team_by_member(user)
            .await?
            .ok_or(Conflict::NotOnTeam)?;
        if !team.is_captain(user) && !is_admin {
            return Err(Conflict::NotCaptain.into());
        }
        Ok(team)
    }

    pub fn open_edit(&self, conversation: u64, user: i64, team: Team) -> String {
        let session = RegistrationSession {
            owner: user,
            step: Step::TeamName,
            draft: Draft::default(),
            editing: Some(team),
        };
        let greeting = format!(
            "👋 Hi <@{}>! Let's edit your team: **{}**\n\n{}",
            user,
            session.editing.as_ref().map_or("", |t| t.name.as_str()),
            session.prompt(Step::TeamName)
        );
        self.sessions.put(conversation, session);
        greeting
    }

    /// A message in `conversation`. `None` unless the dialog's owner wrote it.
    ///
    /// Errors leave the session on the same step.
    pub async fn reply(
        &self,
        conversation: u64,
        author: i64,
        text: &str,
    ) -> Option<BotResult<RegistrationReply>> {
        let session = self.sessions.get(&conversation)?;
        if session.owner != author {
            return None;
        }
        Some(self.answer(conversation, session, text.trim()).await)
    }

    async fn answer(
        &self,
        conversation: u64,
        mut session: RegistrationSession,
        text: &str,
    ) -> BotResult<RegistrationReply> {
        let ack = match session.step {
            Step::TeamName => {
                if text.chars().count() < 3 {
                    return Err(ValidationError::TeamNameTooShort.into());
                }
                if let Some(owner) = self.store.team(text).await? {
                    let own = session.editing.as_ref().is_some_and(|t| t.name == owner.name);
                    if !own {
                        return Err(Conflict::NameTaken.into());
                    }
                }
                session.draft.name = text.to_string();
                format!("✅ Team name set to: **{}**", text)
            }
            Step::TeamTag => {
                let tag = parse_team_tag(text).ok_or(ValidationError::InvalidTeamTag)?;
                let ack = format!("✅ Team tag set to: **[{}]**", tag);
                session.draft.tag = tag;
                ack
            }
            Step::Captain | Step::Player2 | Step::Player3 => {
                if !is_valid_player_id(text) {
                    return Err(ValidationError::InvalidPlayerId.into());
                }
                let (slot, label) = match session.step {
                    Step::Captain => (&mut session.draft.captain_name, "Player 1"),
                    Step::Player2 => (&mut session.draft.player2_name, "Player 2"),
                    _ => (&mut session.draft.player3_name, "Player 3"),
                };
                *slot = text.to_string();
                format!("✅ {} set to: **{}**", label, text)
            }
            Step::Mentions => return self.complete(conversation, session, text).await,
        };

        session.step = session.step.next();
        let reply = RegistrationReply::Prompt {
            step: session.step,
            text: format!("{}\n\n{}", ack, session.prompt(session.step)),
        };
        self.sessions.put(conversation, session);
        Ok(reply)
    }

    async fn complete(
        &self,
        conversation: u64,
        session: RegistrationSession,
        text: &str,
    ) -> BotResult<RegistrationReply> {
        let mentions = parse_mentions(text);
        if mentions.len() != 3 {
            return Err(ValidationError::MentionCount(mentions.len()).into());
        }
        let draft = &session.draft;
        let team = Team {
            name: draft.name.clone(),
            tag: draft.tag.clone(),
            captain_id: session.owner,
            captain_name: draft.captain_name.clone(),
            player2_id: mentions[0],
            player2_name: draft.player2_name.clone(),
            player3_id: mentions[1],
            player3_name: draft.player3_name.clone(),
            created_at: session
                .editing
                .as_ref()
                .map_or_else(|| self.calendar.now(), |t| t.created_at),
        };

        for member in team.members() {
            if let Some(other) = self.store.team_by_member(member).await? {
                let own = session.editing.as_ref().is_some_and(|t| t.name == other.name);
                if !own {
                    return Err(Conflict::MemberOnOtherTeam(member).into());
                }
            }
        }

        let stored = match &session.editing {
            Some(original) => self.store.update_team(&original.name, &team).await,
            None => self.store.insert_team(&team).await.map(|()| true),
        };
        match stored {
            Ok(true) => {}
            Ok(false) => {
                self.sessions.remove(&conversation);
                let original = session.editing.map(|t| t.name).unwrap_or_default();
                return Err(NotFound::Team(original).into());
            }
            Err(StoreError::Duplicate) => return Ok(self.ask_name_again(conversation, session)),
            Err(err) => return Err(err.into()),
        }
        let edited = session.editing.is_some();
        self.sessions.remove(&conversation);
        info!(
            "Team [{}] {} {} by {}",
            team.tag,
            team.name,
            if edited { "updated" } else { "registered" },
            session.owner
        );

        self.grant_verified_role(&team).await;
        let line = if edited {
            format!("✏️ Team updated: **[{}] {}** by <@{}>", team.tag, team.name, session.owner)
        } else {
            format!("✅ New team registered: **[{}] {}** by <@{}>", team.tag, team.name, session.owner)
        };
        if let Err(err) = self.notifier.log(line).await {
            warn!("Could not write to scrim log: {:#}", err);
        }
        self.schedule_archive(conversation);

        let text = confirmation(&team, edited, &self.verified_role);
        Ok(RegistrationReply::Completed { team, edited, text })
    }

    /// Another team took the name since step 1; the dialog goes back to it.
    fn ask_name_again(&self, conversation: u64, mut session: RegistrationSession) -> RegistrationReply {
        session.step = Step::TeamName;
        let text = format!("{}\n\n{}", Conflict::NameTaken, session.prompt(Step::TeamName));
        self.sessions.put(conversation, session);
        RegistrationReply::Prompt {
            step: Step::TeamName,
            text,
        }
    }

    async fn grant_verified_role(&self, team: &Team) {
        let role = match self.notifier.ensure_role(&self.verified_role).await {
            Ok(role) => role,
            Err(err) => {
                error!("Could not provision {} role: {:#}", self.verified_role, err);
                return;
            }
        };
        for member in team.members() {
            if let Err(err) = self.notifier.grant_role(member, role).await {
                warn!("Could not add role to member {}: {:#}", member, err);
            }
        }
    }

    fn schedule_archive(&self, conversation: u64) {
        let notifier = self.notifier.clone();
        let delay = self.archive_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = notifier.archive_conversation(conversation).await {
                warn!("Could not archive thread {}: {:#}", conversation, err);
            }
        });
    }
}

fn confirmation(team: &Team, edited: bool, verified_role: &str) -> String {
    let summary = format!(
        "**Team Name:** {}\n**Team Tag:** [{}]\n**Captain:** {}\n**Player 2:** {}\n**Player 3:** {}",
        team.name, team.tag, team.captain_name, team.player2_name, team.player3_name
    );
    if edited {
        format!(
            "✅ **Team Updated Successfully!**\n\n{}\n\nYou can now close this thread.",
            summary
        )
    } else {
        format!(
            "✅ **Team Registered Successfully!**\n\n{}\n\nAll team members have been granted the **{}** role! You can now check in for scrims.\n\nYou can close this thread now.",
            summary, verified_role
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BotError;
    use crate::testing::{team, Harness, NotifierCall};

    const THREAD: u64 = 777;

    async fn answer(h: &Harness, author: i64, text: &str) -> BotResult<RegistrationReply> {
        h.engine.registrar.reply(THREAD, author, text).await.unwrap()
    }

    async fn walk_to_mentions(h: &Harness, author: i64, name: &str) {
        for text in [
            name,
            "[ab1]",
            "Captain#12345678",
            "Second#23456789",
            "Third#34567890",
        ] {
            answer(h, author, text).await.unwrap();
        }
        assert_eq!(h.engine.registrar.session(THREAD).unwrap().step, Step::Mentions);
    }

    #[tokio::test]
    async fn full_dialog_registers_the_team() {
        let h = Harness::new();
        let greeting = h.engine.registrar.open_registration(THREAD, 1).await.unwrap();
        assert!(greeting.contains("Question 1/6"));

        let reply = answer(&h, 1, "  Night Owls ").await.unwrap();
        assert!(matches!(reply, RegistrationReply::Prompt { step: Step::TeamTag, .. }));
        answer(&h, 1, "[nO1]").await.unwrap();
        answer(&h, 1, "Owl#12345678").await.unwrap();
        answer(&h, 1, "Hoot#23456789").await.unwrap();
        answer(&h, 1, "Feather#34567890").await.unwrap();
        let reply = answer(&h, 1, "<@2> <@!3> <@1>").await.unwrap();

        let RegistrationReply::Completed { team, edited, text } = reply else {
            panic!("dialog should be complete");
        };
        assert!(!edited);
        assert_eq!(team.name, "Night Owls");
        assert_eq!(team.tag, "NO1");
        assert_eq!(team.members(), [1, 2, 3]);
        assert!(text.contains("eSports"));
        assert_eq!(h.store.team("Night Owls").await.unwrap(), Some(team));
        for member in [1, 2, 3] {
            assert!(h.notifier.holds(member, "eSports"));
        }
        assert!(h.engine.registrar.session(THREAD).is_none());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(h.notifier.calls().contains(&NotifierCall::Archive(THREAD)));
    }

    #[tokio::test]
    async fn invalid_answers_repeat_the_same_step() {
        let h = Harness::new();
        h.engine.registrar.open_registration(THREAD, 1).await.unwrap();

        let err = answer(&h, 1, "ab").await.unwrap_err();
        assert!(matches!(err, BotError::Validation(ValidationError::TeamNameTooShort)));
        answer(&h, 1, "Owls").await.unwrap();

        let err = answer(&h, 1, "[TOOLONG]").await.unwrap_err();
        assert!(matches!(err, BotError::Validation(ValidationError::InvalidTeamTag)));
        answer(&h, 1, "OWL").await.unwrap();

        let err = answer(&h, 1, "Owl#1234567").await.unwrap_err();
        assert!(matches!(err, BotError::Validation(ValidationError::InvalidPlayerId)));
        let err = answer(&h, 1, "Owl-12345678").await.unwrap_err();
        assert!(matches!(err, BotError::Validation(ValidationError::InvalidPlayerId)));
        assert_eq!(h.engine.registrar.session(THREAD).unwrap().step, Step::Captain);
    }

    #[tokio::test]
    async fn only_the_owner_drives_the_dialog() {
        let h = Harness::new();
        h.engine.registrar.open_registration(THREAD, 1).await.unwrap();
        assert!(h.engine.registrar.reply(THREAD, 2, "Hijack").await.is_none());
        assert!(h.engine.registrar.reply(THREAD + 1, 1, "Elsewhere").await.is_none());
        assert_eq!(h.engine.registrar.session(THREAD).unwrap().step, Step::TeamName);
    }

    #[tokio::test]
    async fn member_of_alpha_cannot_register_another_team() {
        let h = Harness::new();
        h.store.put_team(team("Alpha", 10));
        let err = h.engine.registrar.ensure_can_register(11).await.unwrap_err();
        assert!(matches!(err, BotError::Conflict(Conflict::AlreadyOnTeam)));
        let err = h.engine.registrar.open_registration(THREAD, 12).await.unwrap_err();
        assert!(matches!(err, BotError::Conflict(Conflict::AlreadyOnTeam)));
        assert!(h.engine.registrar.session(THREAD).is_none());
        assert_eq!(h.store.teams().await.unwrap().len(), 1);
        assert!(h.notifier.calls().is_empty());
    }

    #[tokio::test]
    async fn taken_name_is_rejected_on_create() {
        let h = Harness::new();
        h.store.put_team(team("Alpha", 10));
        h.engine.registrar.open_registration(THREAD, 1).await.unwrap();
        let err = answer(&h, 1, "Alpha").await.unwrap_err();
        assert!(matches!(err, BotError::Conflict(Conflict::NameTaken)));
    }

    #[tokio::test]
    async fn name_taken_during_the_dialog_goes_back_to_the_name() {
        let h = Harness::new();
        h.engine.registrar.open_registration(THREAD, 1).await.unwrap();
        walk_to_mentions(&h, 1, "Bravo").await;
        h.store.put_team(team("Bravo", 20));

        let reply = answer(&h, 1, "<@2> <@3> <@1>").await.unwrap();
        let RegistrationReply::Prompt { step, text } = reply else {
            panic!("dialog should ask for a new name");
        };
        assert_eq!(step, Step::TeamName);
        assert!(text.contains("already taken"));
        assert!(text.contains("Question 1/6"));
        assert_eq!(h.engine.registrar.session(THREAD).unwrap().step, Step::TeamName);

        walk_to_mentions(&h, 1, "Charlie").await;
        let reply = answer(&h, 1, "<@2> <@3> <@1>").await.unwrap();
        assert!(matches!(reply, RegistrationReply::Completed { edited: false, .. }));
        assert_eq!(h.store.team("Charlie").await.unwrap().unwrap().members(), [1, 2, 3]);
        assert_eq!(h.store.team("Bravo").await.unwrap().unwrap().captain_id, 20);
    }

    #[tokio::test]
    async fn mentioning_a_member_of_another_team_is_a_conflict() {
        let h = Harness::new();
        h.store.put_team(team("Alpha", 10));
        h.engine.registrar.open_registration(THREAD, 1).await.unwrap();
        walk_to_mentions(&h, 1, "Bravo").await;

        let err = answer(&h, 1, "<@2> <@11> <@1>").await.unwrap_err();
        assert!(matches!(err, BotError::Conflict(Conflict::MemberOnOtherTeam(11))));
        let err = answer(&h, 1, "<@2> <@3>").await.unwrap_err();
        assert!(matches!(err, BotError::Validation(ValidationError::MentionCount(2))));
        assert_eq!(h.engine.registrar.session(THREAD).unwrap().step, Step::Mentions);
        assert!(h.store.team("Bravo").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn store_outage_keeps_the_last_step() {
        let h = Harness::new();
        h.engine.registrar.open_registration(THREAD, 1).await.unwrap();
        walk_to_mentions(&h, 1, "Bravo").await;
        h.store.set_failing(true);
        let err = answer(&h, 1, "<@2> <@3> <@1>").await.unwrap_err();
        assert!(err.is_infrastructure());
        h.store.set_failing(false);
        let reply = answer(&h, 1, "<@2> <@3> <@1>").await.unwrap();
        assert!(matches!(reply, RegistrationReply::Completed { edited: false, .. }));
    }

    #[tokio::test]
    async fn only_captain_or_admin_may_edit() {
        let h = Harness::new();
        h.store.put_team(team("Alpha", 10));
        let err = h.engine.registrar.prepare_edit(11, false).await.unwrap_err();
        assert!(matches!(err, BotError::Conflict(Conflict::NotCaptain)));
        let err = h.engine.registrar.prepare_edit(99, true).await.unwrap_err();
        assert!(matches!(err, BotError::Conflict(Conflict::NotOnTeam)));
        assert_eq!(h.engine.registrar.prepare_edit(11, true).await.unwrap().name, "Alpha");
        assert_eq!(h.engine.registrar.prepare_edit(10, false).await.unwrap().name, "Alpha");
    }

    #[tokio::test]
    async fn edit_renames_in_place_and_regrants_the_role() {
        let h = Harness::new();
        h.store.put_team(team("Alpha", 10));
        h.store.put_team(team("Bravo", 20));
        let alpha = h.engine.registrar.prepare_edit(10, false).await.unwrap();
        let greeting = h.engine.registrar.open_edit(THREAD, 10, alpha.clone());
        assert!(greeting.contains("(Current: Alpha)"));

        let err = answer(&h, 10, "Bravo").await.unwrap_err();
        assert!(matches!(err, BotError::Conflict(Conflict::NameTaken)));
        // Keeping its own name is fine
        answer(&h, 10, "Alpha").await.unwrap();
        h.engine.registrar.sessions.remove(&THREAD);

        h.engine.registrar.open_edit(THREAD, 10, alpha.clone());
        walk_to_mentions(&h, 10, "Alpha Prime").await;
        let reply = answer(&h, 10, "<@11> <@13> <@10>").await.unwrap();
        let RegistrationReply::Completed { team, edited, .. } = reply else {
            panic!("edit should be complete");
        };
        assert!(edited);
        assert_eq!(team.members(), [10, 11, 13]);
        assert_eq!(team.created_at, alpha.created_at);
        assert!(h.store.team("Alpha").await.unwrap().is_none());
        assert_eq!(h.store.team("Alpha Prime").await.unwrap(), Some(team));
        assert!(h.notifier.holds(13, "eSports"));
    }
}
