// RustPixel
// copyright zipxing@hotmail.com 2022～2025

//! WGSL sources for the built-in effects.
//!
//! All fragment shaders share one binding layout:
//! - `@group(0) @binding(0)` input texture
//! - `@group(0) @binding(1)` linear clamp sampler
//! - `@group(0) @binding(2)` effect uniform block (16 bytes)

/// Full-screen triangle generated from `vertex_index`, no vertex buffer
pub const FULLSCREEN_VS: &str = r#"
struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var out: VertexOutput;
    let x = f32((vertex_index << 1u) & 2u);
    let y = f32(vertex_index & 2u);
    out.position = vec4<f32>(x * 2.0 - 1.0, 1.0 - y * 2.0, 0.0, 1.0);
    out.uv = vec2<f32>(x, y);
    return out;
}
"#;

pub const FXAA_FS: &str = r#"
struct FxaaUniforms {
    subpixel_quality: f32,
    edge_threshold: f32,
    edge_threshold_min: f32,
    _pad: f32,
};

@group(0) @binding(0) var t_input: texture_2d<f32>;
@group(0) @binding(1) var s_input: sampler;
@group(0) @binding(2) var<uniform> params: FxaaUniforms;

fn luma(c: vec3<f32>) -> f32 {
    return dot(c, vec3<f32>(0.299, 0.587, 0.114));
}

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    let texel = 1.0 / vec2<f32>(textureDimensions(t_input));
    let center = textureSampleLevel(t_input, s_input, uv, 0.0);
    let n = luma(textureSampleLevel(t_input, s_input, uv + vec2<f32>(0.0, -texel.y), 0.0).rgb);
    let s = luma(textureSampleLevel(t_input, s_input, uv + vec2<f32>(0.0, texel.y), 0.0).rgb);
    let e = luma(textureSampleLevel(t_input, s_input, uv + vec2<f32>(texel.x, 0.0), 0.0).rgb);
    let w = luma(textureSampleLevel(t_input, s_input, uv + vec2<f32>(-texel.x, 0.0), 0.0).rgb);
    let m = luma(center.rgb);

    let luma_min = min(m, min(min(n, s), min(e, w)));
    let luma_max = max(m, max(max(n, s), max(e, w)));
    let range = luma_max - luma_min;
    if (range < max(params.edge_threshold_min, luma_max * params.edge_threshold)) {
        return center;
    }

    let horizontal = abs(n + s - 2.0 * m) >= abs(e + w - 2.0 * m);
    var step = vec2<f32>(texel.x, 0.0);
    if (horizontal) {
        step = vec2<f32>(0.0, texel.y);
    }
    let blend = clamp(abs((n + s + e + w) * 0.25 - m) / range, 0.0, 1.0) * params.subpixel_quality;
    let a = textureSampleLevel(t_input, s_input, uv + step * 0.5, 0.0);
    let b = textureSampleLevel(t_input, s_input, uv - step * 0.5, 0.0);
    return mix(center, (a + b) * 0.5, blend);
}
"#;

pub const BLUR_FS: &str = r#"
struct BlurUniforms {
    radius: f32,
    intensity: f32,
    _pad0: f32,
    _pad1: f32,
};

@group(0) @binding(0) var t_input: texture_2d<f32>;
@group(0) @binding(1) var s_input: sampler;
@group(0) @binding(2) var<uniform> params: BlurUniforms;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    let texel = 1.0 / vec2<f32>(textureDimensions(t_input));
    let center = textureSampleLevel(t_input, s_input, uv, 0.0);
    let r = i32(params.radius);
    var sum = vec4<f32>(0.0);
    var weight = 0.0;
    for (var dy = -r; dy <= r; dy = dy + 1) {
        for (var dx = -r; dx <= r; dx = dx + 1) {
            let d = vec2<f32>(f32(dx), f32(dy));
            let w = exp(-dot(d, d) / (2.0 * params.radius * params.radius));
            sum = sum + textureSampleLevel(t_input, s_input, uv + d * texel, 0.0) * w;
            weight = weight + w;
        }
    }
    let blurred = sum / weight;
    return mix(center, blurred, clamp(params.intensity, 0.0, 2.0));
}
"#;

pub const BRIGHTNESS_CONTRAST_FS: &str = r#"
struct BrightnessContrastUniforms {
    brightness: f32,
    contrast: f32,
    _pad0: f32,
    _pad1: f32,
};

@group(0) @binding(0) var t_input: texture_2d<f32>;
@group(0) @binding(1) var s_input: sampler;
@group(0) @binding(2) var<uniform> params: BrightnessContrastUniforms;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    let color = textureSampleLevel(t_input, s_input, uv, 0.0);
    var rgb = color.rgb + vec3<f32>(params.brightness);
    rgb = (rgb - vec3<f32>(0.5)) * params.contrast + vec3<f32>(0.5);
    return vec4<f32>(rgb, color.a);
}
"#;

pub const TONE_MAPPING_FS: &str = r#"
struct ToneMappingUniforms {
    mode: u32,
    exposure: f32,
    gamma: f32,
    _pad: f32,
};

@group(0) @binding(0) var t_input: texture_2d<f32>;
@group(0) @binding(1) var s_input: sampler;
@group(0) @binding(2) var<uniform> params: ToneMappingUniforms;

fn aces(x: vec3<f32>) -> vec3<f32> {
    let a = 2.51;
    let b = 0.03;
    let c = 2.43;
    let d = 0.59;
    let e = 0.14;
    return clamp((x * (a * x + b)) / (x * (c * x + d) + e), vec3<f32>(0.0), vec3<f32>(1.0));
}

fn uncharted2_partial(x: vec3<f32>) -> vec3<f32> {
    let a = 0.15;
    let b = 0.50;
    let c = 0.10;
    let d = 0.20;
    let e = 0.02;
    let f = 0.30;
    return ((x * (a * x + c * b) + d * e) / (x * (a * x + b) + d * f)) - e / f;
}

fn uncharted2(x: vec3<f32>) -> vec3<f32> {
    let white = uncharted2_partial(vec3<f32>(11.2));
    return uncharted2_partial(x * 2.0) / white;
}

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    let color = textureSampleLevel(t_input, s_input, uv, 0.0);
    let hdr = color.rgb * params.exposure;
    var mapped = hdr;
    switch params.mode {
        case 1u: { mapped = hdr / (hdr + vec3<f32>(1.0)); }
        case 2u: { mapped = aces(hdr); }
        case 3u: { mapped = uncharted2(hdr); }
        default: { mapped = clamp(hdr, vec3<f32>(0.0), vec3<f32>(1.0)); }
    }
    let corrected = pow(max(mapped, vec3<f32>(0.0)), vec3<f32>(1.0 / params.gamma));
    return vec4<f32>(corrected, color.a);
}
"#;

pub const VIGNETTE_FS: &str = r#"
struct VignetteUniforms {
    intensity: f32,
    smoothness: f32,
    _pad0: f32,
    _pad1: f32,
};

@group(0) @binding(0) var t_input: texture_2d<f32>;
@group(0) @binding(1) var s_input: sampler;
@group(0) @binding(2) var<uniform> params: VignetteUniforms;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    let color = textureSampleLevel(t_input, s_input, uv, 0.0);
    let d = distance(uv, vec2<f32>(0.5));
    let inner = 0.75 - params.smoothness * 0.5;
    let factor = 1.0 - smoothstep(inner, 0.75, d) * params.intensity;
    return vec4<f32>(color.rgb * factor, color.a);
}
"#;
