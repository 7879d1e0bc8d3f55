use bevy::{audio::Volume, prelude::*};

pub struct GameAudioPlugin;

impl Plugin for GameAudioPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_audio)
            .add_systems(Update, sync_move_sound_system)
            .add_observer(on_play_sound);
    }
}

#[derive(Resource)]
pub struct GameAudio {
    /// Handle<T> is Bevy's way of referencing assets.
    pub walk: Handle<AudioSource>,
    pub tackle: Handle<AudioSource>,
    pub shoot: Handle<AudioSource>,
    pub coin: Handle<AudioSource>,
    pub block_hit: Handle<AudioSource>,
    pub block_break: Handle<AudioSource>,
    pub extra_life: Handle<AudioSource>,
    pub enemy_hit: Handle<AudioSource>,
    pub enemy_defeated: Handle<AudioSource>,
    pub stomp: Handle<AudioSource>,
    pub hurt: Handle<AudioSource>,
    pub jump: Handle<AudioSource>,
    pub level_complete: Handle<AudioSource>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SoundKind {
    Shoot,
    Coin,
    BlockHit,
    BlockBreak,
    ExtraLife,
    EnemyHit,
    EnemyDefeated,
    Stomp,
    Hurt,
    Jump,
    LevelComplete,
}

impl GameAudio {
    pub fn one_shot(&self, kind: SoundKind) -> Handle<AudioSource> {
        let handle = match kind {
            SoundKind::Shoot => &self.shoot,
            SoundKind::Coin => &self.coin,
            SoundKind::BlockHit => &self.block_hit,
            SoundKind::BlockBreak => &self.block_break,
            SoundKind::ExtraLife => &self.extra_life,
            SoundKind::EnemyHit => &self.enemy_hit,
            SoundKind::EnemyDefeated => &self.enemy_defeated,
            SoundKind::Stomp => &self.stomp,
            SoundKind::Hurt => &self.hurt,
            SoundKind::Jump => &self.jump,
            SoundKind::LevelComplete => &self.level_complete,
        };
        handle.clone()
    }
}

pub fn setup_audio(mut commands: Commands, asset_server: Res<AssetServer>) {
    // The actual loading happens in the background - asset_server.load()
    // returns immediately with a Handle that will be valid once loading completes.
    commands.insert_resource(GameAudio {
        walk: asset_server.load("audio/walk.wav"),
        tackle: asset_server.load("audio/tackle.wav"),
        shoot: asset_server.load("audio/shoot.wav"),
        coin: asset_server.load("audio/coin.wav"),
        block_hit: asset_server.load("audio/block_hit.wav"),
        block_break: asset_server.load("audio/block_break.wav"),
        extra_life: asset_server.load("audio/extra_life.wav"),
        enemy_hit: asset_server.load("audio/enemy_hit.wav"),
        enemy_defeated: asset_server.load("audio/enemy_defeated.wav"),
        stomp: asset_server.load("audio/stomp.wav"),
        hurt: asset_server.load("audio/hurt.wav"),
        jump: asset_server.load("audio/jump.wav"),
        level_complete: asset_server.load("audio/up.wav"),
    });
}

/// Fire-and-forget sound effect.
#[derive(Event, Debug, Clone, Copy)]
pub struct PlaySound(pub SoundKind);

pub fn on_play_sound(trigger: On<PlaySound>, mut commands: Commands, audio: Option<Res<GameAudio>>) {
    // Headless runs have no audio resource; sounds are simply skipped.
    let Some(audio) = audio else {
        return;
    };
    commands.spawn((
        AudioPlayer::new(audio.one_shot(trigger.0)),
        PlaybackSettings::DESPAWN,
    ));
}

/// Which loop an enemy wants to be heard playing.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum MoveSoundMode {
    #[default]
    Silent,
    Walk,
    Tackle,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MoveSoundProfile {
    pub patrol_volume: f32,
    pub patrol_pitch: f32,
    pub tackle_volume: f32,
    pub tackle_pitch: f32,
}

impl Default for MoveSoundProfile {
    fn default() -> Self {
        Self {
            patrol_volume: 0.6,
            patrol_pitch: 1.0,
            tackle_volume: 1.0,
            tackle_pitch: 1.2,
        }
    }
}

impl MoveSoundProfile {
    /// Volume and pitch for a mode, or None when nothing should play.
    pub fn settings(&self, mode: MoveSoundMode) -> Option<(f32, f32)> {
        match mode {
            MoveSoundMode::Silent => None,
            MoveSoundMode::Walk => Some((self.patrol_volume, self.patrol_pitch)),
            MoveSoundMode::Tackle => Some((self.tackle_volume, self.tackle_pitch)),
        }
    }
}

/// Looping movement sound. Behaviour code only writes `mode`; the emitter
/// child is swapped by [`sync_move_sound_system`] when the mode changes.
#[derive(Component, Debug, Default)]
pub struct MoveSound {
    pub mode: MoveSoundMode,
    pub profile: MoveSoundProfile,
    emitter: Option<(MoveSoundMode, Entity)>,
}

pub fn sync_move_sound_system(
    mut commands: Commands,
    mut sounds: Query<(Entity, &mut MoveSound), Changed<MoveSound>>,
    audio: Option<Res<GameAudio>>,
) {
    let Some(audio) = audio else {
        return;
    };

    for (entity, mut sound) in sounds.iter_mut() {
        let playing = sound.emitter.map(|(mode, _)| mode);
        let wanted = sound.profile.settings(sound.mode).map(|_| sound.mode);
        if playing == wanted {
            continue;
        }

        if let Some((_, emitter)) = sound.emitter.take() {
            commands.entity(emitter).try_despawn();
        }

        let Some((volume, pitch)) = sound.profile.settings(sound.mode) else {
            continue;
        };
        let clip = match sound.mode {
            MoveSoundMode::Tackle => audio.tackle.clone(),
            _ => audio.walk.clone(),
        };
        let emitter = commands
            .spawn((
                AudioPlayer::new(clip),
                PlaybackSettings::LOOP
                    .with_volume(Volume::Linear(volume))
                    .with_speed(pitch),
                ChildOf(entity),
            ))
            .id();
        sound.emitter = Some((sound.mode, emitter));
    }
}
