use bevy::prelude::*;
use clap::Parser;

use student_quest::{config::Cli, StudentQuestPlugin};

fn main() {
    let cli = Cli::parse();

    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Student Quest".into(),
                ..default()
            }),
            ..default()
        }))
        .insert_resource(ClearColor(Color::srgb(0.45, 0.7, 0.95)))
        .add_plugins(StudentQuestPlugin { cli })
        .run();
}
