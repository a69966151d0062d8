use cascade_core::settings::{phi_from_slider, slider_from_phi, RenderSettings, SettingsSnapshot};

/// Ray step budgets offered by the panel.
const RAY_STEP_CHOICES: [i32; 5] = [32, 64, 128, 256, 512];
const PHI_SLIDER_MAX: u32 = 30;

/// Editable copy of the shared settings for one panel frame.
///
/// Filter coefficients are held as slider positions so an untouched slider
/// never rewrites a coefficient the slider grid cannot represent exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettingsDraft {
    pub max_ray_steps: i32,
    pub max_bounces: i32,
    pub rays_per_pixel: i32,
    pub use_blue_noise: bool,
    pub use_temporal_accumulation: bool,
    pub denoise_iterations: u32,
    pub use_smart_denoise: bool,
    pub use_atrous_denoise: bool,
    pub c_phi: u32,
    pub n_phi: u32,
    pub p_phi: u32,
}

impl SettingsDraft {
    pub fn from_snapshot(s: &SettingsSnapshot) -> Self {
        Self {
            max_ray_steps: s.max_ray_steps,
            max_bounces: s.max_bounces,
            rays_per_pixel: s.rays_per_pixel,
            use_blue_noise: s.use_blue_noise,
            use_temporal_accumulation: s.use_temporal_accumulation,
            denoise_iterations: s.denoise_iterations,
            use_smart_denoise: s.use_smart_denoise,
            use_atrous_denoise: s.use_atrous_denoise,
            c_phi: slider_from_phi(s.c_phi),
            n_phi: slider_from_phi(s.n_phi),
            p_phi: slider_from_phi(s.p_phi),
        }
    }

    /// Write the fields that differ from `before`. Returns how many were written.
    ///
    /// Each setter restarts accumulation, so unchanged fields are left alone.
    pub fn apply(&self, settings: &RenderSettings, before: &SettingsDraft) -> usize {
        let mut writes = 0;
        if self.max_ray_steps != before.max_ray_steps {
            settings.set_max_ray_steps(self.max_ray_steps);
            writes += 1;
        }
        if self.max_bounces != before.max_bounces {
            settings.set_max_bounces(self.max_bounces);
            writes += 1;
        }
        if self.rays_per_pixel != before.rays_per_pixel {
            settings.set_rays_per_pixel(self.rays_per_pixel);
            writes += 1;
        }
        if self.use_blue_noise != before.use_blue_noise {
            settings.set_use_blue_noise(self.use_blue_noise);
            writes += 1;
        }
        if self.use_temporal_accumulation != before.use_temporal_accumulation {
            settings.set_use_temporal_accumulation(self.use_temporal_accumulation);
            writes += 1;
        }
        if self.denoise_iterations != before.denoise_iterations {
            settings.set_denoise_iterations(self.denoise_iterations.max(1));
            writes += 1;
        }
        if self.use_smart_denoise != before.use_smart_denoise {
            settings.set_use_smart_denoise(self.use_smart_denoise);
            writes += 1;
        }
        if self.use_atrous_denoise != before.use_atrous_denoise {
            settings.set_use_atrous_denoise(self.use_atrous_denoise);
            writes += 1;
        }
        for (now, was, set) in [
            (self.c_phi, before.c_phi, RenderSettings::set_c_phi as fn(&RenderSettings, f32)),
            (self.n_phi, before.n_phi, RenderSettings::set_n_phi),
            (self.p_phi, before.p_phi, RenderSettings::set_p_phi),
        ] {
            if now != was {
                set(settings, phi_from_slider(now));
                writes += 1;
            }
        }
        writes
    }
}

/// Draw the settings panel and push any edits into `settings`.
pub fn show(ctx: &egui::Context, settings: &RenderSettings) {
    let before = SettingsDraft::from_snapshot(&settings.snapshot());
    let mut draft = before;
    let mut quit = false;

    egui::CentralPanel::default().show(ctx, |ui| {
        ui.heading("Raytracing");
        ui.label("Max Ray Steps");
        ui.horizontal(|ui| {
            for steps in RAY_STEP_CHOICES {
                if ui
                    .selectable_label(draft.max_ray_steps == steps, steps.to_string())
                    .clicked()
                {
                    draft.max_ray_steps = steps;
                }
            }
        });
        ui.add(egui::Slider::new(&mut draft.max_bounces, 0..=8).text("bounces"));
        ui.add(egui::Slider::new(&mut draft.rays_per_pixel, 1..=16).text("rays per pixel"));
        ui.checkbox(&mut draft.use_blue_noise, "Blue noise");
        ui.checkbox(&mut draft.use_temporal_accumulation, "Temporal accumulation");

        ui.separator();

        ui.heading("Denoising");
        ui.checkbox(&mut draft.use_atrous_denoise, "A-trous filter");
        ui.checkbox(&mut draft.use_smart_denoise, "Smart denoise");
        ui.add(egui::Slider::new(&mut draft.denoise_iterations, 1..=8).text("iterations"));
        phi_slider(ui, &mut draft.c_phi, "c_phi");
        phi_slider(ui, &mut draft.n_phi, "n_phi");
        phi_slider(ui, &mut draft.p_phi, "p_phi");

        ui.separator();

        if ui.button("Quit").clicked() {
            quit = true;
        }
    });

    let writes = draft.apply(settings, &before);
    if writes > 0 {
        log::debug!("Panel wrote {writes} setting(s)");
    }
    if quit {
        log::info!("Shutdown requested from the panel");
        settings.request_shutdown();
    }
}

/// Integer slider with the mapped coefficient shown beside it.
fn phi_slider(ui: &mut egui::Ui, position: &mut u32, name: &str) {
    ui.horizontal(|ui| {
        ui.add(egui::Slider::new(position, 0..=PHI_SLIDER_MAX).show_value(false).text(name));
        ui.label(format!("{:.3}", phi_from_slider(*position)));
    });
}

#[cfg(test)]
mod tests {
    use cascade_core::config::RenderDefaults;

    use super::*;

    fn settings() -> RenderSettings {
        RenderSettings::new(&RenderDefaults::default())
    }

    #[test]
    fn test_unchanged_draft_writes_nothing() {
        let s = settings();
        let draft = SettingsDraft::from_snapshot(&s.snapshot());
        assert_eq!(draft.apply(&s, &draft), 0);
        assert!(!s.take_invalidate_request());
    }

    #[test]
    fn test_changed_field_is_written_and_invalidates() {
        let s = settings();
        let before = SettingsDraft::from_snapshot(&s.snapshot());
        let mut draft = before;
        draft.max_bounces = before.max_bounces + 1;
        draft.use_atrous_denoise = !before.use_atrous_denoise;

        assert_eq!(draft.apply(&s, &before), 2);
        assert_eq!(s.max_bounces(), before.max_bounces + 1);
        assert_eq!(s.use_atrous_denoise(), !before.use_atrous_denoise);
        assert!(s.take_invalidate_request());
    }

    #[test]
    fn test_phi_slider_maps_through_decades() {
        let s = settings();
        let before = SettingsDraft::from_snapshot(&s.snapshot());
        let mut draft = before;
        draft.c_phi = 15;
        draft.p_phi = 25;
        draft.apply(&s, &before);
        assert!((s.c_phi() - 0.05).abs() < 1e-6);
        assert!((s.p_phi() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_untouched_phi_keeps_exact_value() {
        let s = settings();
        s.set_n_phi(0.0123);
        let before = SettingsDraft::from_snapshot(&s.snapshot());
        let mut draft = before;
        draft.rays_per_pixel += 1;
        draft.apply(&s, &before);
        assert_eq!(s.n_phi(), 0.0123);
    }

    #[test]
    fn test_denoise_iterations_never_zero() {
        let s = settings();
        let before = SettingsDraft::from_snapshot(&s.snapshot());
        let mut draft = before;
        draft.denoise_iterations = 0;
        draft.apply(&s, &before);
        assert_eq!(s.denoise_iterations(), 1);
    }

    #[test]
    fn test_idle_panel_frame_leaves_settings_alone() {
        let s = settings();
        let initial = s.snapshot();
        let ctx = egui::Context::default();
        for _ in 0..2 {
            let _ = ctx.run(egui::RawInput::default(), |ctx| show(ctx, &s));
        }
        assert_eq!(s.snapshot(), initial);
        assert!(!s.take_invalidate_request());
        assert!(!s.shutdown_requested());
    }
}
