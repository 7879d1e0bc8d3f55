// ui.rs - HUD, title overlay, pause menu and the end-of-level panel.
//
// Gameplay code never touches UI nodes directly. It changes GameSession (the
// HUD follows it) or triggers one of the events below.

use bevy::{
    prelude::*,
    window::{CursorOptions, PrimaryWindow},
};

use crate::{
    camera::{set_cursor_locked, PowerUpCamera},
    config::GameConfig,
    level::LevelLoaded,
    player::StopPlayer,
    resources::{GameSession, LevelSummary},
    save_load::{save_to_disk, SaveData},
    GamePhase,
};

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PauseState>()
            .add_systems(Startup, setup_ui)
            .add_systems(OnEnter(GamePhase::Playing), hide_title)
            .add_systems(
                Update,
                (
                    start_game_system.run_if(in_state(GamePhase::Title)),
                    (pause_input_system, pause_menu_buttons)
                        .run_if(in_state(GamePhase::Playing)),
                    hud_sync_system.run_if(resource_changed::<GameSession>),
                    end_sequence_system.run_if(resource_exists::<EndSequence>),
                ),
            )
            .add_observer(on_start_game)
            .add_observer(on_toggle_pause)
            .add_observer(on_pause_game)
            .add_observer(on_quit_game)
            .add_observer(on_show_end_game)
            .add_observer(on_level_loaded);
    }
}

// =============================================================================
// Components and resources
// =============================================================================

/// Everything the game shows on screen. Always visible; its children toggle.
#[derive(Component)]
pub struct GameCanvas;

#[derive(Component)]
pub struct Hud;

/// Which HUD counter a text node shows.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HudField {
    Lives,
    Time,
    Coins,
}

/// Inner bar of the power-up capsule; its width is the fill.
#[derive(Component)]
pub struct CapsuleFill;

#[derive(Component)]
pub struct TitleOverlay;

#[derive(Component)]
pub struct PauseMenu;

#[derive(Component)]
pub struct ResumeButton;

#[derive(Component)]
pub struct QuitButton;

#[derive(Component)]
pub struct EndPanel;

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryField {
    Coins,
    RedCoins,
    Bricks,
    GoldenBlocks,
    Time,
    Percentage,
    Best,
}

impl SummaryField {
    pub const ALL: [SummaryField; 7] = [
        SummaryField::Coins,
        SummaryField::RedCoins,
        SummaryField::Bricks,
        SummaryField::GoldenBlocks,
        SummaryField::Time,
        SummaryField::Percentage,
        SummaryField::Best,
    ];
}

#[derive(Resource, Debug, Default)]
pub struct PauseState {
    pub paused: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndStage {
    /// Waiting out the frame the goal was touched on.
    WaitFrame { skipped: bool },
    /// HUD hidden and camera moving; panel shows when the timer ends.
    Reveal,
}

/// Running end-of-level sequence.
#[derive(Resource, Debug)]
pub struct EndSequence {
    stage: EndStage,
    timer: Timer,
    next_level: String,
}

// =============================================================================
// Events
// =============================================================================

#[derive(Event, Debug, Clone, Copy)]
pub struct StartGame;

#[derive(Event, Debug, Clone, Copy)]
pub struct TogglePause;

#[derive(Event, Debug, Clone, Copy)]
pub struct PauseGame(pub bool);

#[derive(Event, Debug, Clone, Copy)]
pub struct QuitGame;

#[derive(Event, Debug, Clone)]
pub struct ShowEndGame {
    pub next_level: String,
}

// =============================================================================
// Formatting
// =============================================================================

pub fn format_time(seconds: f32) -> String {
    let total = seconds.max(0.0).round() as u32;
    format!("{}:{:02}", total / 60, total % 60)
}

pub fn format_summary(field: SummaryField, summary: &LevelSummary, best: Option<u32>) -> String {
    let pair = |(got, total): (u32, u32)| format!("{got} / {total}");
    match field {
        SummaryField::Coins => pair(summary.coins),
        SummaryField::RedCoins => pair(summary.red_coins),
        SummaryField::Bricks => pair(summary.bricks),
        SummaryField::GoldenBlocks => pair(summary.golden_blocks),
        SummaryField::Time => format_time(summary.time_taken),
        SummaryField::Percentage => format!("{}%", summary.percentage),
        SummaryField::Best => match best {
            Some(best) => format!("Best {best}%"),
            None => String::new(),
        },
    }
}

fn label(field: SummaryField) -> &'static str {
    match field {
        SummaryField::Coins => "Coins",
        SummaryField::RedCoins => "Red coins",
        SummaryField::Bricks => "Bricks",
        SummaryField::GoldenBlocks => "Golden blocks",
        SummaryField::Time => "Time",
        SummaryField::Percentage => "Complete",
        SummaryField::Best => "",
    }
}

// =============================================================================
// Setup
// =============================================================================

fn hud_text(value: &str, font_size: f32) -> (Text, TextFont, TextColor) {
    (
        Text::new(value),
        TextFont {
            font_size,
            ..default()
        },
        TextColor(Color::WHITE),
    )
}

fn menu_button(parent: &mut ChildSpawnerCommands, text: &str, marker: impl Bundle) {
    parent
        .spawn((
            Button,
            Node {
                width: Val::Px(220.0),
                height: Val::Px(60.0),
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                border: UiRect::all(Val::Px(3.0)),
                ..default()
            },
            BackgroundColor(Color::srgb(0.15, 0.2, 0.45)),
            BorderColor::all(Color::srgb(0.5, 0.6, 0.9)),
            marker,
        ))
        .with_children(|button| {
            button.spawn(hud_text(text, 32.0));
        });
}

/// Builds every UI node once. Initial state: coins "0", empty capsule, title
/// shown, pause menu and end panel hidden.
pub fn setup_ui(mut commands: Commands) {
    commands
        .spawn((
            GameCanvas,
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                ..default()
            },
            BackgroundColor(Color::NONE),
        ))
        .with_children(|canvas| {
            // Top bar: lives, capsule, time, coins.
            canvas
                .spawn((
                    Hud,
                    Node {
                        position_type: PositionType::Absolute,
                        width: Val::Percent(100.0),
                        padding: UiRect::all(Val::Px(20.0)),
                        justify_content: JustifyContent::SpaceBetween,
                        align_items: AlignItems::Center,
                        ..default()
                    },
                    Visibility::Inherited,
                ))
                .with_children(|hud| {
                    hud.spawn((HudField::Lives, hud_text("3", 32.0)));
                    hud.spawn((
                        Node {
                            width: Val::Px(200.0),
                            height: Val::Px(22.0),
                            border: UiRect::all(Val::Px(2.0)),
                            ..default()
                        },
                        BorderColor::all(Color::WHITE),
                        BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.4)),
                    ))
                    .with_children(|capsule| {
                        capsule.spawn((
                            CapsuleFill,
                            Node {
                                width: Val::Percent(0.0),
                                height: Val::Percent(100.0),
                                ..default()
                            },
                            BackgroundColor(Color::srgb(0.9, 0.1, 0.1)),
                        ));
                    });
                    hud.spawn((HudField::Time, hud_text("0", 32.0)));
                    hud.spawn((HudField::Coins, hud_text("0", 32.0)));
                });

            canvas
                .spawn((
                    TitleOverlay,
                    Node {
                        position_type: PositionType::Absolute,
                        width: Val::Percent(100.0),
                        height: Val::Percent(100.0),
                        flex_direction: FlexDirection::Column,
                        justify_content: JustifyContent::Center,
                        align_items: AlignItems::Center,
                        ..default()
                    },
                    BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.6)),
                    // Every run starts on the title; it goes away for good on
                    // the first key press.
                    Visibility::Visible,
                ))
                .with_children(|title| {
                    title.spawn(hud_text("STUDENT QUEST", 96.0));
                    title.spawn(hud_text("Press any key", 32.0));
                });

            canvas
                .spawn((
                    PauseMenu,
                    Node {
                        position_type: PositionType::Absolute,
                        width: Val::Percent(100.0),
                        height: Val::Percent(100.0),
                        flex_direction: FlexDirection::Column,
                        justify_content: JustifyContent::Center,
                        align_items: AlignItems::Center,
                        row_gap: Val::Px(16.0),
                        ..default()
                    },
                    BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.5)),
                    Visibility::Hidden,
                ))
                .with_children(|menu| {
                    menu.spawn(hud_text("Paused", 64.0));
                    menu_button(menu, "Resume", ResumeButton);
                    menu_button(menu, "Quit (Q)", QuitButton);
                });

            canvas
                .spawn((
                    EndPanel,
                    Node {
                        position_type: PositionType::Absolute,
                        width: Val::Percent(100.0),
                        height: Val::Percent(100.0),
                        flex_direction: FlexDirection::Column,
                        justify_content: JustifyContent::Center,
                        align_items: AlignItems::Center,
                        row_gap: Val::Px(8.0),
                        ..default()
                    },
                    Visibility::Hidden,
                ))
                .with_children(|panel| {
                    panel.spawn(hud_text("Level complete!", 64.0));
                    for field in SummaryField::ALL {
                        panel
                            .spawn(Node {
                                column_gap: Val::Px(24.0),
                                ..default()
                            })
                            .with_children(|row| {
                                row.spawn(hud_text(label(field), 28.0));
                                row.spawn((field, hud_text("", 28.0)));
                            });
                    }
                });
        });
}

fn hide_title(mut overlays: Query<&mut Visibility, With<TitleOverlay>>) {
    for mut visibility in overlays.iter_mut() {
        *visibility = Visibility::Hidden;
    }
}

// =============================================================================
// Input
// =============================================================================

pub fn start_game_system(
    mut commands: Commands,
    keyboard: Res<ButtonInput<KeyCode>>,
    mouse: Option<Res<ButtonInput<MouseButton>>>,
) {
    let clicked = mouse.is_some_and(|mouse| mouse.get_just_pressed().next().is_some());
    if keyboard.get_just_pressed().next().is_some() || clicked {
        commands.trigger(StartGame);
    }
}

pub fn pause_input_system(
    mut commands: Commands,
    keyboard: Res<ButtonInput<KeyCode>>,
    pause: Res<PauseState>,
) {
    if keyboard.just_pressed(KeyCode::Escape) {
        commands.trigger(TogglePause);
    } else if pause.paused && keyboard.just_pressed(KeyCode::KeyQ) {
        commands.trigger(QuitGame);
    }
}

pub fn pause_menu_buttons(
    mut commands: Commands,
    resume: Query<&Interaction, (Changed<Interaction>, With<ResumeButton>)>,
    quit: Query<&Interaction, (Changed<Interaction>, With<QuitButton>)>,
) {
    if resume.iter().any(|i| *i == Interaction::Pressed) {
        commands.trigger(PauseGame(false));
    }
    if quit.iter().any(|i| *i == Interaction::Pressed) {
        commands.trigger(QuitGame);
    }
}

// =============================================================================
// Observers
// =============================================================================

pub fn on_start_game(_trigger: On<StartGame>, mut next_phase: ResMut<NextState<GamePhase>>) {
    info!("Game started");
    next_phase.set(GamePhase::Playing);
}

pub fn on_toggle_pause(_trigger: On<TogglePause>, mut commands: Commands, pause: Res<PauseState>) {
    commands.trigger(PauseGame(!pause.paused));
}

/// Paused: virtual time stops (so FixedUpdate and every timer stop with it),
/// the cursor is freed and the menu shown. Resuming undoes all three.
pub fn on_pause_game(
    trigger: On<PauseGame>,
    mut pause: ResMut<PauseState>,
    time: Option<ResMut<Time<Virtual>>>,
    mut cursors: Query<&mut CursorOptions, With<PrimaryWindow>>,
    mut menus: Query<&mut Visibility, With<PauseMenu>>,
) {
    let paused = trigger.0;
    pause.paused = paused;

    if let Some(mut time) = time {
        if paused {
            time.pause();
        } else {
            time.unpause();
        }
    }
    for mut options in cursors.iter_mut() {
        set_cursor_locked(&mut options, !paused);
    }
    for mut visibility in menus.iter_mut() {
        *visibility = if paused {
            Visibility::Visible
        } else {
            Visibility::Hidden
        };
    }
}

pub fn on_quit_game(_trigger: On<QuitGame>, mut exit: MessageWriter<AppExit>) {
    info!("Quitting");
    exit.write(AppExit::Success);
}

pub fn on_show_end_game(trigger: On<ShowEndGame>, mut commands: Commands) {
    commands.insert_resource(EndSequence {
        stage: EndStage::WaitFrame { skipped: false },
        timer: Timer::from_seconds(0.0, TimerMode::Once),
        next_level: trigger.next_level.clone(),
    });
}

/// A fresh level gets a fresh HUD: panel hidden, HUD back, no sequence running.
pub fn on_level_loaded(
    _trigger: On<LevelLoaded>,
    mut commands: Commands,
    mut huds: Query<&mut Visibility, (With<Hud>, Without<EndPanel>)>,
    mut panels: Query<&mut Visibility, (With<EndPanel>, Without<Hud>)>,
    mut cursors: Query<&mut CursorOptions, With<PrimaryWindow>>,
    pause: Res<PauseState>,
) {
    commands.remove_resource::<EndSequence>();
    for mut visibility in huds.iter_mut() {
        *visibility = Visibility::Inherited;
    }
    for mut visibility in panels.iter_mut() {
        *visibility = Visibility::Hidden;
    }
    for mut options in cursors.iter_mut() {
        set_cursor_locked(&mut options, !pause.paused);
    }
}

// =============================================================================
// Per-frame
// =============================================================================

pub fn hud_sync_system(
    session: Res<GameSession>,
    mut texts: Query<(&HudField, &mut Text)>,
    mut fills: Query<&mut Node, With<CapsuleFill>>,
) {
    for (field, mut text) in texts.iter_mut() {
        let value = match field {
            HudField::Lives => session.lives.to_string(),
            HudField::Time => session.seconds_left().to_string(),
            HudField::Coins => session.coins.to_string(),
        };
        if text.0 != value {
            text.0 = value;
        }
    }
    for mut node in fills.iter_mut() {
        node.width = Val::Percent(session.capsule_fill() * 100.0);
    }
}

/// Steps the end-of-level sequence: one frame of grace, then clear the
/// summary, hide the HUD and swing the camera; after the reveal delay fill the
/// summary, record the result, stop the player and show the panel.
#[allow(clippy::too_many_arguments)]
pub fn end_sequence_system(
    mut commands: Commands,
    time: Res<Time>,
    mut sequence: ResMut<EndSequence>,
    session: Res<GameSession>,
    config: Option<Res<GameConfig>>,
    save: Option<ResMut<SaveData>>,
    mut texts: Query<(&SummaryField, &mut Text)>,
    mut huds: Query<&mut Visibility, (With<Hud>, Without<EndPanel>)>,
    mut panels: Query<&mut Visibility, (With<EndPanel>, Without<Hud>)>,
    mut cursors: Query<&mut CursorOptions, With<PrimaryWindow>>,
) {
    match sequence.stage {
        EndStage::WaitFrame { skipped: false } => {
            sequence.stage = EndStage::WaitFrame { skipped: true };
        }
        EndStage::WaitFrame { skipped: true } => {
            for (_, mut text) in texts.iter_mut() {
                text.0.clear();
            }
            for mut visibility in huds.iter_mut() {
                *visibility = Visibility::Hidden;
            }
            commands.trigger(PowerUpCamera);

            let delay = config
                .map(|config| config.end_panel_delay_secs)
                .unwrap_or_else(|| GameConfig::default().end_panel_delay_secs);
            sequence.timer = Timer::from_seconds(delay, TimerMode::Once);
            sequence.stage = EndStage::Reveal;
        }
        EndStage::Reveal => {
            if !sequence.timer.tick(time.delta()).is_finished() {
                return;
            }

            for mut options in cursors.iter_mut() {
                options.visible = true;
            }

            let summary = session.summary();
            let best = save.map(|mut save| {
                save.record(&session.level, &summary, &sequence.next_level);
                save_to_disk(&save);
                save.best(&session.level)
                    .map(|record| record.best_percentage)
                    .unwrap_or(summary.percentage)
            });
            for (field, mut text) in texts.iter_mut() {
                text.0 = format_summary(*field, &summary, best);
            }
            info!(
                "Level {} finished: {}% in {}",
                session.level,
                summary.percentage,
                format_time(summary.time_taken)
            );

            commands.trigger(StopPlayer);
            for mut visibility in panels.iter_mut() {
                *visibility = Visibility::Inherited;
            }
            commands.remove_resource::<EndSequence>();
        }
    }
}
