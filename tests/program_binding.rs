use buffers_and_bindings::bindings::InputValue;
use buffers_and_bindings::bindings::index_buffer::{IndexBuffer, IndexType};
use buffers_and_bindings::bindings::inputs::GenericValue;
use buffers_and_bindings::bindings::texture::{Texture, TextureData};
use buffers_and_bindings::bindings::vertex_buffer::VertexBuffer;
use buffers_and_bindings::images::device::DeviceLimits;
use buffers_and_bindings::images::program::Program;
use buffers_and_bindings::images::reflection::SlotRole;
use buffers_and_bindings::images::render_pass::{DrawCommand, Primitive};
use buffers_and_bindings::images::shader::{CompileStatus, ShaderStage};
use buffers_and_bindings::images::vertex_layout::{VertexFieldType, VertexLayout};
use buffers_and_bindings::{AttributeState, Error, HeadlessDevice, ObjectState};

const VERTEX: &str = "attribute vec3 a_position;
attribute vec4 a_color;
uniform mat4 u_transform;
varying vec4 v_color;
void main() {
    v_color = a_color;
    gl_Position = u_transform * vec4(a_position, 1.0);
}";

const FRAGMENT: &str = "varying vec4 v_color;
uniform sampler2D u_base;
uniform sampler2D u_overlay;
void main() {
    gl_FragColor = v_color * texture2D(u_base, vec2(0.5)) + texture2D(u_overlay, vec2(0.5));
}";

const IDENTITY: [[f32; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 3],
    color: [u8; 4],
}

fn program() -> Program {
    Program::new(ShaderStage::vertex(VERTEX), ShaderStage::fragment(FRAGMENT))
        .with_debug_name("textured")
}

fn texture(value: u8) -> Texture {
    Texture::new(TextureData::new(&[2, 2], 4, &[value; 16]).unwrap()).unwrap()
}

fn interleaved(rows: usize) -> VertexBuffer {
    let mut layout = VertexLayout::new();
    layout.add_field("position", VertexFieldType::F32, 3).unwrap();
    layout.add_field("color", VertexFieldType::U8, 4).unwrap();
    let records: Vec<Vertex> = (0..rows)
        .map(|i| Vertex {
            position: [i as f32, 0.0, 0.0],
            color: [255, 0, 0, 255],
        })
        .collect();
    VertexBuffer::from_records(layout, &records).unwrap()
}

#[test]
fn failing_stage_leaves_program_unlinked() {
    let fragment = ShaderStage::fragment("void main() {\n    gl_FragColor = vec4(1.0;\n}");
    let mut program = Program::new(ShaderStage::vertex(VERTEX), fragment.clone());
    let mut device = HeadlessDevice::new();

    let err = program.activate(&mut device).unwrap_err();
    let Error::Link { diagnostics } = err else {
        panic!("expected a link error, got {err:?}");
    };
    assert_eq!(diagnostics[0].line, Some(3));
    assert_eq!(diagnostics[0].source_line.as_deref(), Some("}"));
    assert_eq!(program.active_inputs().count(), 0);
    assert_eq!(program.state(), ObjectState::Error);
    assert_eq!(fragment.status(), CompileStatus::Attempted);

    //pinned: activating again neither recompiles nor draws
    {
        let mut active = program.activate(&mut device).unwrap();
        active.draw(Primitive::Triangles, None).unwrap();
    }
    assert_eq!(device.compile_count(fragment.handle().unwrap()), 1);
    assert!(device.draws().is_empty());

    fragment.set_source("void main() {\n    gl_FragColor = vec4(1.0);\n}");
    drop(program.activate(&mut device).unwrap());
    assert_eq!(program.state(), ObjectState::Valid);
    assert!(program.is_linked());
    assert!(program.active_inputs().any(|i| i.name == "a_position"));
    program.delete(&mut device);
    //still held here, so the program left it alone
    assert!(fragment.handle().is_some());
    fragment.delete(&mut device);
}

#[test]
fn arity_is_checked_once_linked() {
    let mut program = program();
    let mut device = HeadlessDevice::new();
    drop(program.activate(&mut device).unwrap());

    let err = program
        .set_attribute("a_color", [1.0f32, 0.0, 0.0])
        .unwrap_err();
    assert!(matches!(
        err,
        Error::BindingArity { ref name, expected: 4, got: 3 } if name == "a_color"
    ));
    let err = program
        .set_attribute("a_color", InputValue::dense(&[0.0f32; 9], 3).unwrap())
        .unwrap_err();
    assert!(matches!(err, Error::BindingArity { .. }));
    assert!(matches!(
        program.set_uniform("u_base", 1.0f32),
        Err(Error::InvalidBinding { kind: "generic", .. })
    ));
    program.set_attribute("a_color", [1.0f32, 0.0, 0.0, 1.0]).unwrap();
    program.delete(&mut device);
}

#[test]
fn arity_is_checked_at_activation_when_deferred() {
    let mut program = program();
    program
        .set_attribute("a_position", InputValue::dense(&[0.0f32; 8], 2).unwrap())
        .unwrap();
    let mut device = HeadlessDevice::new();
    assert!(matches!(
        program.activate(&mut device),
        Err(Error::BindingArity {
            expected: 3,
            got: 2,
            ..
        })
    ));
    //the failed activation released the program
    assert_eq!(device.program_in_use(), None);
    program.delete(&mut device);
}

#[test]
fn samplers_get_ascending_units_per_activation() {
    let base = texture(10);
    let overlay = texture(20);
    let mut program = program();
    program.set_uniform("u_base", &base).unwrap();
    program.set_uniform("u_overlay", &overlay).unwrap();
    let mut device = HeadlessDevice::new();

    for _ in 0..2 {
        drop(program.activate(&mut device).unwrap());
        let handle = program.handle().unwrap();
        assert_eq!(device.sampler_unit(handle, "u_base"), Some(0));
        assert_eq!(device.sampler_unit(handle, "u_overlay"), Some(1));
        assert_eq!(device.bound_texture(0), base.handle());
        assert_eq!(device.bound_texture(1), overlay.handle());
    }
    program.delete(&mut device);
    base.delete(&mut device);
    overlay.delete(&mut device);
}

#[test]
fn resetting_a_sampler_keeps_its_unit() {
    let base = texture(10);
    let overlay = texture(20);
    let mut program = program();
    program.set_uniform("u_base", &base).unwrap();
    program.set_uniform("u_overlay", &overlay).unwrap();
    let mut device = HeadlessDevice::new();
    {
        let mut active = program.activate(&mut device).unwrap();
        //well past the 16 units the device has
        for _ in 0..40 {
            active.set_uniform("u_overlay", &overlay).unwrap();
        }
        active.set_uniform("u_base", &overlay).unwrap();
    }
    let handle = program.handle().unwrap();
    assert_eq!(device.sampler_unit(handle, "u_base"), Some(0));
    assert_eq!(device.sampler_unit(handle, "u_overlay"), Some(1));
    assert_eq!(device.bound_texture(0), overlay.handle());
    assert_eq!(device.bound_texture(1), overlay.handle());
    assert_eq!(device.bound_texture(2), None);
    program.delete(&mut device);
    base.delete(&mut device);
    overlay.delete(&mut device);
}

#[test]
fn attributes_without_values_read_the_default() {
    let vertices = interleaved(3);
    let mut positioned = program();
    positioned
        .set_attribute("a_position", vertices.field("position").unwrap())
        .unwrap();
    let mut bare = program();
    let mut device = HeadlessDevice::new();
    {
        let mut active = positioned.activate(&mut device).unwrap();
        active.draw(Primitive::Points, None).unwrap();
    }
    assert!(matches!(
        device.draws()[0].attributes[0].1,
        AttributeState::Pointer { .. }
    ));
    {
        let mut active = bare.activate(&mut device).unwrap();
        active.draw(Primitive::Points, None).unwrap();
    }
    //the array left enabled by the first program is not read
    let last = device.draws().last().unwrap();
    assert_eq!(last.attributes.len(), 2);
    assert!(
        last.attributes
            .iter()
            .all(|(_, state)| *state == AttributeState::Disabled)
    );
    positioned.delete(&mut device);
    bare.delete(&mut device);
}

#[test]
fn running_out_of_texture_units_is_unsupported() {
    let base = texture(1);
    let overlay = texture(2);
    let mut program = program();
    program.set_uniform("u_base", &base).unwrap();
    program.set_uniform("u_overlay", &overlay).unwrap();
    let mut device = HeadlessDevice::with_limits(DeviceLimits {
        max_texture_units: 1,
        ..DeviceLimits::default()
    });
    assert!(matches!(
        program.activate(&mut device),
        Err(Error::BackendUnsupported { .. })
    ));
    program.delete(&mut device);
    base.delete(&mut device);
    overlay.delete(&mut device);
}

#[test]
fn draws_use_the_shortest_varying() {
    let vertices = interleaved(3);
    let mut program = program();
    program
        .set_attribute("a_position", InputValue::dense(&[0.0f32; 12], 3).unwrap())
        .unwrap();
    program
        .set_attribute("a_color", vertices.field("color").unwrap())
        .unwrap();
    program.set_uniform("u_transform", IDENTITY).unwrap();
    //kept but never applied
    program.set_uniform("u_not_in_shader", 1.0f32).unwrap();
    let base = texture(1);
    program.set_uniform("u_base", &base).unwrap();
    program.set_uniform("u_overlay", &base).unwrap();

    let mut device = HeadlessDevice::new();
    {
        let mut active = program.activate(&mut device).unwrap();
        active.draw(Primitive::Triangles, None).unwrap();
    }
    let handle = program.handle().unwrap();
    let draw = &device.draws()[0];
    assert_eq!(draw.program, handle);
    assert_eq!(draw.command, DrawCommand::Arrays { first: 0, count: 3 });
    assert_eq!(draw.textures.len(), 2);
    assert!(program.value("u_not_in_shader").is_some());

    let AttributeState::Pointer { pointer, buffer } = device.attribute_state(handle, "a_color") else {
        panic!("a_color reads a buffer");
    };
    assert_eq!(Some(buffer), vertices.handle());
    assert_eq!((pointer.offset, pointer.stride, pointer.arity), (12, 16, 4));
    assert_eq!(
        device.uniform_value(handle, "u_transform"),
        Some(GenericValue::from(IDENTITY))
    );
    program.delete(&mut device);
    base.delete(&mut device);
}

#[test]
fn indexed_draws() {
    let vertices = interleaved(4);
    let mut indices = IndexBuffer::from_slice(&[0u16, 1, 2, 2, 1, 3]);
    let mut program = program();
    program
        .set_attribute("a_position", vertices.field("position").unwrap())
        .unwrap();
    program
        .set_attribute("a_color", vertices.field("color").unwrap())
        .unwrap();
    let mut device = HeadlessDevice::new();
    {
        let mut active = program.activate(&mut device).unwrap();
        active.set_uniform("u_transform", IDENTITY).unwrap();
        active.draw(Primitive::Triangles, Some(&indices)).unwrap();
    }
    let draw = &device.draws()[0];
    assert_eq!(
        draw.command,
        DrawCommand::Elements {
            count: 6,
            index_type: IndexType::U16
        }
    );
    assert_eq!(draw.index_buffer, indices.handle());
    program.delete(&mut device);
    indices.delete(&mut device);
}

#[test]
fn wide_indices_need_the_extension() {
    let indices = IndexBuffer::from_slice(&[0u32, 1, 2]);
    let mut program = program();
    let mut device = HeadlessDevice::with_limits(DeviceLimits {
        extensions: Vec::new(),
        ..DeviceLimits::default()
    });
    {
        let mut active = program.activate(&mut device).unwrap();
        assert!(matches!(
            active.draw(Primitive::Triangles, Some(&indices)),
            Err(Error::BackendUnsupported { .. })
        ));
    }
    assert!(device.draws().is_empty());
    program.delete(&mut device);
}

#[test]
fn values_convert_to_the_slot_kind() {
    let vertex = ShaderStage::vertex(
        "uniform int u_count;
         uniform bool u_enabled;
         void main() {
             gl_Position = vec4(float(u_count));
             if (u_enabled) { gl_Position.x = 0.0; }
         }",
    );
    let fragment = ShaderStage::fragment("void main() { gl_FragColor = vec4(1.0); }");
    let mut program = Program::new(vertex, fragment);
    program.set_uniform("u_count", 2.6f32).unwrap();
    program.set_uniform("u_enabled", true).unwrap();
    let mut device = HeadlessDevice::new();
    drop(program.activate(&mut device).unwrap());
    let handle = program.handle().unwrap();
    assert_eq!(
        device.uniform_value(handle, "u_count"),
        Some(GenericValue::Int(vec![3]))
    );
    assert_eq!(
        device.uniform_value(handle, "u_enabled"),
        Some(GenericValue::Int(vec![1]))
    );
    let roles: Vec<SlotRole> = program.active_inputs().map(|i| i.role).collect();
    assert_eq!(roles, [SlotRole::Uniform, SlotRole::Uniform]);
    program.delete(&mut device);
}

#[test]
fn delete_without_context_is_tolerated() {
    let mut program = program();
    let mut device = HeadlessDevice::new();
    drop(program.activate(&mut device).unwrap());
    device.lose_context();
    program.delete(&mut device);
    assert_eq!(program.handle(), None);
    assert_eq!(program.state(), ObjectState::Deleted);
    assert!(matches!(program.activate(&mut device), Err(Error::Context)));
}
