use crate::input::{collect_input_nonblocking, map_event_to_action, UiAction};
use crate::render::{
    draw_center_box, draw_naming, draw_pet_screen, draw_selection, NamingView, PetView, Terminal,
};
use crate::Cli;
use pocket_critters::config::{load_settings, save_settings_atomic, Paths, Settings};
use pocket_critters::{
    ActionOutcome, EventLog, JsonFileStore, MemoryStore, OfflineReport, PetSession, Phase,
    Registry, SnapshotStore, StatEvent, SystemClock,
};
use std::rc::Rc;
use std::time::{Duration, Instant};

const TOAST_TTL: Duration = Duration::from_secs(4);

pub(crate) enum Screen {
    Selection { cursor: usize },
    Naming,
    Pet,
    Rename,
    Help,
    Recap(OfflineReport),
}

struct Toast {
    text: String,
    until: Instant,
}

struct Animation {
    outcome: ActionOutcome,
    started: Instant,
}

impl Animation {
    fn running(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started) < self.outcome.animation_duration
    }

    /// One cell hop every 150ms while the animation plays.
    fn bounce(&self, now: Instant) -> i32 {
        let ms = now.saturating_duration_since(self.started).as_millis();
        if (ms / 150) % 2 == 0 {
            0
        } else {
            -1
        }
    }
}

pub(crate) struct App {
    /// As read from settings.json; CLI overrides are not written back.
    file_settings: Settings,
    settings: Settings,
    session: PetSession,
    events: EventLog,
    screen: Screen,
    name_edit: String,
    notice: Option<String>,
    toasts: Vec<Toast>,
    animation: Option<Animation>,
    paths: Paths,
    ephemeral: bool,
    term: Terminal,
    should_quit: bool,
}

impl App {
    fn init(cli: Cli, paths: Paths) -> anyhow::Result<Self> {
        let file_settings = load_settings(&paths.settings_path);
        let mut settings = file_settings.clone();
        if let Some(ms) = cli.decay_interval_ms {
            settings.decay_interval_ms = ms;
        }
        if cli.no_color {
            settings.enable_color = false;
        }

        let mut store: Box<dyn SnapshotStore> = if cli.ephemeral {
            Box::new(MemoryStore::new())
        } else {
            Box::new(JsonFileStore::new(paths.save_path.clone()))
        };
        if cli.fresh {
            log::info!("--fresh given, discarding any saved pet");
            store.clear();
        }

        let mut session = PetSession::new(
            Rc::new(Registry::builtin()),
            &settings,
            store,
            Box::new(SystemClock),
        );
        let events = EventLog::new();
        session.subscribe(events.clone());

        let screen = match session.load_saved() {
            Some(report) if report.has_anything() => Screen::Recap(report),
            Some(_) => Screen::Pet,
            None => Screen::Selection { cursor: 0 },
        };

        let term = Terminal::begin()?;

        Ok(Self {
            file_settings,
            settings,
            session,
            events,
            screen,
            name_edit: String::new(),
            notice: None,
            toasts: Vec::new(),
            animation: None,
            paths,
            ephemeral: cli.ephemeral,
            term,
            should_quit: false,
        })
    }

    fn run(&mut self) -> anyhow::Result<()> {
        let fps = self.settings.fps_cap.clamp(10, 240);
        let frame_dt = Duration::from_secs_f32(1.0 / fps as f32);

        while !self.should_quit {
            let frame_start = Instant::now();
            self.term.resize_if_needed()?;

            for ev in collect_input_nonblocking(frame_dt)? {
                if let Some(action) = map_event_to_action(&self.screen, ev) {
                    self.handle(action);
                }
                if self.should_quit {
                    break;
                }
            }

            self.session.tick();
            self.collect_events(frame_start);

            self.render_frame(frame_start)?;
            spin_sleep(frame_dt, frame_start);
        }

        self.session.save();
        Ok(())
    }

    fn handle(&mut self, action: UiAction) {
        if action == UiAction::Quit {
            self.should_quit = true;
            return;
        }

        match self.screen {
            Screen::Selection { ref mut cursor } => {
                let count = self.session.registry().species_list().len();
                match action {
                    UiAction::Up if count > 0 => *cursor = (*cursor + count - 1) % count,
                    UiAction::Down if count > 0 => *cursor = (*cursor + 1) % count,
                    UiAction::Confirm => {
                        let picked = self
                            .session
                            .registry()
                            .species_list()
                            .get(*cursor)
                            .map(|s| s.id.clone());
                        if let Some(id) = picked {
                            if self.session.select_species(&id).is_ok() {
                                self.name_edit.clear();
                                self.notice = None;
                                self.screen = Screen::Naming;
                            }
                        }
                    }
                    _ => {}
                }
            }
            Screen::Naming => match action {
                UiAction::Char(ch) => self.type_char(ch),
                UiAction::Backspace => {
                    self.name_edit.pop();
                }
                UiAction::Left => self.cycle_color(-1),
                UiAction::Right => self.cycle_color(1),
                UiAction::Confirm => match self.session.confirm_name(&self.name_edit) {
                    Ok(()) => {
                        self.notice = None;
                        self.screen = Screen::Pet;
                    }
                    Err(e) => self.notice = Some(e.to_string()),
                },
                UiAction::Back => {
                    let cursor = self.naming_species_index().unwrap_or(0);
                    self.session.back_to_selection();
                    self.screen = Screen::Selection { cursor };
                }
                _ => {}
            },
            Screen::Rename => match action {
                UiAction::Char(ch) => self.type_char(ch),
                UiAction::Backspace => {
                    self.name_edit.pop();
                }
                UiAction::Confirm => match self.session.rename(&self.name_edit) {
                    Ok(()) => {
                        self.notice = None;
                        self.screen = Screen::Pet;
                    }
                    Err(e) => self.notice = Some(e.to_string()),
                },
                UiAction::Back => {
                    self.notice = None;
                    self.screen = Screen::Pet;
                }
                _ => {}
            },
            Screen::Pet => match action {
                UiAction::Perform(i) => self.perform(i),
                UiAction::OpenRename => {
                    self.name_edit = self
                        .session
                        .identity()
                        .map(|id| id.name.clone())
                        .unwrap_or_default();
                    self.notice = None;
                    self.screen = Screen::Rename;
                }
                UiAction::ChangePet => {
                    self.session.change_pet();
                    self.animation = None;
                    self.toasts.clear();
                    self.screen = Screen::Selection { cursor: 0 };
                }
                UiAction::HelpToggle => self.screen = Screen::Help,
                _ => {}
            },
            Screen::Help => {
                if action == UiAction::HelpToggle {
                    self.screen = Screen::Pet;
                }
            }
            Screen::Recap(_) => {
                if action == UiAction::Dismiss {
                    self.screen = Screen::Pet;
                }
            }
        }
    }

    fn type_char(&mut self, ch: char) {
        if self.name_edit.chars().count() < self.settings.max_name_len {
            self.name_edit.push(ch);
        }
    }

    fn naming_species_index(&self) -> Option<usize> {
        let Phase::Naming { species_id, .. } = self.session.phase() else {
            return None;
        };
        self.session
            .registry()
            .species_list()
            .iter()
            .position(|s| &s.id == species_id)
    }

    fn cycle_color(&mut self, step: isize) {
        let Phase::Naming {
            species_id,
            color_id,
        } = self.session.phase()
        else {
            return;
        };
        let Some(species) = self.session.registry().species(species_id) else {
            return;
        };
        let n = species.colors.len() as isize;
        if n == 0 {
            return;
        }
        let at = species
            .colors
            .iter()
            .position(|c| &c.id == color_id)
            .unwrap_or(0) as isize;
        let next = species.colors[(at + step).rem_euclid(n) as usize].id.clone();
        if let Err(e) = self.session.select_color(&next) {
            log::warn!("color change failed: {e}");
        }
    }

    fn perform(&mut self, index: usize) {
        let Some(action) = self.session.registry().actions().get(index) else {
            return;
        };
        let (id, name) = (action.id.clone(), action.name.clone());
        match self.session.perform_action(&id) {
            Some(outcome) => {
                self.animation = Some(Animation {
                    outcome,
                    started: Instant::now(),
                });
            }
            None => self.toast(format!("Can't {} right now", name.to_lowercase())),
        }
    }

    fn toast(&mut self, text: String) {
        self.toasts.push(Toast {
            text,
            until: Instant::now() + TOAST_TTL,
        });
    }

    fn collect_events(&mut self, now: Instant) {
        for event in self.events.drain() {
            if let StatEvent::Critical { stat_id, .. } = event {
                let pet = self
                    .session
                    .identity()
                    .map(|id| id.name.clone())
                    .unwrap_or_default();
                let stat = self
                    .session
                    .registry()
                    .stat(&stat_id)
                    .map(|s| s.name.to_lowercase())
                    .unwrap_or(stat_id);
                self.toast(format!("{pet}'s {stat} is getting low!"));
            }
        }
        self.toasts.retain(|t| t.until > now);
        if self.animation.as_ref().is_some_and(|a| !a.running(now)) {
            self.animation = None;
        }
    }

    fn render_frame(&mut self, now: Instant) -> anyhow::Result<()> {
        self.term.cur.clear();
        let color = self.settings.enable_color;

        match &self.screen {
            Screen::Selection { cursor } => {
                draw_selection(&mut self.term.cur, self.session.registry(), *cursor);
            }
            Screen::Naming => {
                if let Phase::Naming {
                    species_id,
                    color_id,
                } = self.session.phase()
                {
                    let view = NamingView {
                        species_id,
                        color_id,
                        name_edit: &self.name_edit,
                        max_name_len: self.settings.max_name_len,
                        notice: self.notice.as_deref(),
                        color,
                    };
                    draw_naming(&mut self.term.cur, self.session.registry(), &view);
                }
            }
            Screen::Pet | Screen::Rename | Screen::Help | Screen::Recap(_) => {
                let toasts: Vec<String> = self.toasts.iter().map(|t| t.text.clone()).collect();
                let view = PetView {
                    animation: self
                        .animation
                        .as_ref()
                        .map(|a| (a.outcome.animation.as_str(), a.outcome.food_particle.as_str())),
                    toasts: &toasts,
                    bounce: self.animation.as_ref().map_or(0, |a| a.bounce(now)),
                    color,
                    now,
                };
                draw_pet_screen(&mut self.term.cur, &self.session, &view);
            }
        }

        match &self.screen {
            Screen::Rename => {
                let mut preview = self.name_edit.clone();
                if preview.chars().count() < self.settings.max_name_len {
                    preview.push('_');
                }
                let mut body = format!(
                    "Type a name (max {} chars).\n\nName: {preview}\n\n",
                    self.settings.max_name_len
                );
                if let Some(notice) = &self.notice {
                    body.push_str(notice);
                    body.push('\n');
                }
                body.push_str("Enter save | Esc cancel | Backspace delete");
                draw_center_box(&mut self.term.cur, "Rename pet", &body);
            }
            Screen::Help => {
                let body = help_text(self.session.registry());
                draw_center_box(&mut self.term.cur, "How to play", &body);
            }
            Screen::Recap(report) => {
                draw_center_box(
                    &mut self.term.cur,
                    "While you were away…",
                    &recap_text(&self.session, report),
                );
            }
            _ => {}
        }

        self.term.present(true)?;
        Ok(())
    }
}

fn help_text(registry: &Registry) -> String {
    let mut s = String::from("Stats drop over time. Keep them above zero.\n\n");
    for (i, action) in registry.actions().iter().enumerate() {
        let effects: Vec<String> = action
            .effects
            .iter()
            .map(|e| format!("{:+} {}", e.amount, e.stat_id))
            .collect();
        s.push_str(&format!("{} {}: {}\n", i + 1, action.name, effects.join(", ")));
    }
    s.push_str("\nR rename | Shift+X change pet\nEsc or H to close help.");
    s
}

fn recap_text(session: &PetSession, report: &OfflineReport) -> String {
    let since = report
        .away_since
        .with_timezone(&chrono::Local)
        .format("%Y-%m-%d %H:%M");
    let mut s = format!(
        "Last seen {since}\n{} decay intervals passed\n\n",
        report.elapsed_intervals
    );
    for change in &report.changes {
        let name = session
            .registry()
            .stat(&change.stat_id)
            .map_or(change.stat_id.as_str(), |d| d.name.as_str());
        s.push_str(&format!(
            "{name:<10} {:>5.1} -> {:>5.1}\n",
            change.before, change.after
        ));
    }
    s.push_str("\nPress any key");
    s
}

pub(crate) fn run(cli: Cli, paths: Paths) -> anyhow::Result<()> {
    let mut app = App::init(cli, paths)?;
    let result = app.run();
    // restore the terminal even when the loop failed
    app.term.end()?;
    result?;
    if !app.ephemeral {
        save_settings_atomic(&app.paths.settings_path, &app.file_settings)?;
    }
    log::info!("bye");
    Ok(())
}

fn spin_sleep(target: Duration, start: Instant) {
    let end = start + target;
    loop {
        let t = Instant::now();
        if t >= end {
            break;
        }
        let left = end - t;
        if left > Duration::from_millis(2) {
            std::thread::sleep(Duration::from_millis(1));
        } else {
            std::hint::spin_loop();
        }
    }
}
