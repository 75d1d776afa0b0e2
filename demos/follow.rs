use avian3d::prelude::*;
use bevy::prelude::*;
use bevy_follow::prelude::*;

/// Marks the keyboard-controlled agent
#[derive(Component)]
struct Player;

fn main() {
    App::new()
        .add_plugins(DefaultPlugins)
        .add_plugins(PhysicsPlugins::default())
        .add_plugins(FollowPlugin)
        .add_plugins(DebugFollowPlugin)
        .add_systems(Startup, setup)
        .add_systems(Update, (player_input, toggle_followers))
        .run();
}

/// WASD to move, shift to run, space to jump, Q/E to turn.
fn player_input(
    keys: Res<ButtonInput<KeyCode>>,
    time: Res<Time>,
    mut query: Query<&mut PlayerLocomotion, With<Player>>,
) {
    for mut locomotion in query.iter_mut() {
        let mut input = Vec2::ZERO;
        if keys.pressed(KeyCode::KeyW) {
            input.y += 1.0;
        }
        if keys.pressed(KeyCode::KeyS) {
            input.y -= 1.0;
        }
        if keys.pressed(KeyCode::KeyD) {
            input.x += 1.0;
        }
        if keys.pressed(KeyCode::KeyA) {
            input.x -= 1.0;
        }
        locomotion.set_move_input(input);
        locomotion.set_running(keys.pressed(KeyCode::ShiftLeft));

        let mut turn = 0.0;
        if keys.pressed(KeyCode::KeyE) {
            turn += 1.0;
        }
        if keys.pressed(KeyCode::KeyQ) {
            turn -= 1.0;
        }
        // 2 radians per second with the default sensitivity
        locomotion.add_look(Vec2::new(turn * 200.0 * time.delta_secs(), 0.0));

        if keys.just_pressed(KeyCode::Space) {
            locomotion.request_jump();
        }
    }
}

/// F toggles whether the followers follow.
fn toggle_followers(keys: Res<ButtonInput<KeyCode>>, mut query: Query<&mut Follow>) {
    if !keys.just_pressed(KeyCode::KeyF) {
        return;
    }
    for mut follow in query.iter_mut() {
        let enabled = follow.is_enabled();
        follow.set_enabled(!enabled);
    }
}

fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    // The player. Followers find it through the FollowTarget tag.
    commands.spawn((
        Player,
        FollowTarget,
        PlayerLocomotion::default(),
        Mover::default().with_face_movement(false),
        Transform::from_xyz(0.0, 1.5, 0.0),
        character_capsule(0.4, 1.0),
        Mesh3d(meshes.add(Capsule3d::new(0.4, 1.0))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.2, 0.4, 0.8),
            ..default()
        })),
    ));

    // Followers with different standoff distances
    let followers = [
        (Vec3::new(-8.0, 1.5, 6.0), Follow::default()),
        (
            Vec3::new(8.0, 1.5, 6.0),
            Follow::default()
                .with_target_distance(3.0)
                .with_slowing_radius(8.0),
        ),
        (
            Vec3::new(0.0, 1.5, -8.0),
            Follow::default()
                .with_target_distance(0.0)
                .with_min_speed_when_close(0.0)
                .with_arrival_threshold(0.9),
        ),
    ];
    for (position, follow) in followers {
        commands.spawn((
            follow,
            Mover::default().with_base_speed(4.0),
            Transform::from_translation(position),
            character_capsule(0.3, 0.6),
            Mesh3d(meshes.add(Capsule3d::new(0.3, 0.6))),
            MeshMaterial3d(materials.add(StandardMaterial {
                base_color: Color::srgb(0.8, 0.2, 0.2),
                ..default()
            })),
        ));
    }

    // Platform
    commands.spawn((
        Mesh3d(meshes.add(Plane3d::new(Vec3::Y, Vec2::new(20.0, 20.0)))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.3, 0.5, 0.3),
            ..default()
        })),
        Transform::from_xyz(0.0, -0.1, 0.0),
        RigidBody::Static,
        Collider::cuboid(40.0, 0.2, 40.0),
    ));

    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(0.0, 25.0, 20.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: 10000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(4.0, 8.0, 4.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
}
