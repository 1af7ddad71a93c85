use crate::domain::EventLog;
use crate::error::Result;
use crate::models::application::{Application, ApplicationStatus};
use crate::models::status_event::{EventKind, StatusEvent};
use chrono::{DateTime, Utc};
use rust_xlsxwriter::*;
use std::collections::HashMap;
use uuid::Uuid;

const TRAIL_LIMIT: usize = 6;

/// Event kinds whose latest occurrence dates each report column.
const SUBMITTED_KINDS: &[EventKind] = &[EventKind::ResumeSent];
const CONFIRMED_KINDS: &[EventKind] = &[EventKind::ConfirmationReceived];
const RESPONSE_KINDS: &[EventKind] = &[
    EventKind::InterviewScheduled,
    EventKind::InterviewPassed,
    EventKind::AnotherInterviewScheduled,
    EventKind::DocumentsRequested,
];
const REJECTION_KINDS: &[EventKind] = &[EventKind::RejectionReceived];

pub struct ExportService;

/// Date shown for a transition: the latest matching event, else the flag
/// timestamp kept on the application.
fn transition_date(
    log: &EventLog,
    kinds: &[EventKind],
    fallback: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    log.latest_of_kind(kinds)
        .map(|event| event.occurred_at)
        .or(fallback)
}

fn format_moment(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|d| d.format("%d.%m.%Y %H:%M").to_string())
        .unwrap_or_else(|| "—".to_string())
}

/// Oldest first. Only the newest events are kept so the cell stays readable.
fn status_trail(events: &[StatusEvent]) -> String {
    let mut ordered: Vec<&StatusEvent> = events.iter().collect();
    ordered.sort_by(|a, b| (a.occurred_at, a.id).cmp(&(b.occurred_at, b.id)));

    let hidden = ordered.len().saturating_sub(TRAIL_LIMIT);
    let mut lines: Vec<String> = Vec::with_capacity(TRAIL_LIMIT + 1);
    if hidden > 0 {
        lines.push("...".to_string());
    }
    lines.extend(ordered.iter().skip(hidden).map(|event| {
        format!(
            "{}: {}",
            event.occurred_at.format("%d.%m.%Y"),
            event.kind.label()
        )
    }));
    if lines.is_empty() {
        return "—".to_string();
    }
    lines.join("\n")
}

fn status_color(status: ApplicationStatus) -> Color {
    match status {
        ApplicationStatus::NotApplied => Color::RGB(0x64748B),
        ApplicationStatus::Applied => Color::RGB(0x3B82F6),
        ApplicationStatus::Confirmed => Color::RGB(0x0EA5E9),
        ApplicationStatus::InterviewScheduled
        | ApplicationStatus::InterviewPassed
        | ApplicationStatus::DocumentsRequested => Color::RGB(0x8B5CF6),
        ApplicationStatus::ResponseReceived => Color::RGB(0xF59E0B),
        ApplicationStatus::Rejected => Color::RGB(0xEF4444),
        ApplicationStatus::Accepted => Color::RGB(0x10B981),
    }
}

impl ExportService {
    /// Generate a styled XLSX workbook with one row per application.
    pub fn generate_applications_xlsx(
        applications: &[Application],
        category_names: &HashMap<i64, String>,
        events_by_application: &HashMap<Uuid, Vec<StatusEvent>>,
    ) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Applications")?;

        let primary_color = Color::RGB(0x1E293B);
        let header_bg = Color::RGB(0x0F172A);
        let header_text = Color::White;
        let alt_row_1 = Color::RGB(0xF8FAFC);
        let alt_row_2 = Color::White;
        let border_color = Color::RGB(0xE2E8F0);

        let columns = [
            ("#", 6.0),
            ("Position", 32.0),
            ("Company", 26.0),
            ("Category", 18.0),
            ("Status", 22.0),
            ("Resume Submitted", 18.0),
            ("Confirmation", 18.0),
            ("Response", 18.0),
            ("Rejection", 18.0),
            ("Interview", 18.0),
            ("Created", 18.0),
            ("Status History", 48.0),
        ];

        for (i, (_, width)) in columns.iter().enumerate() {
            worksheet.set_column_width(i as u16, *width)?;
        }

        // ── Title rows ──
        let title_format = Format::new()
            .set_font_size(16)
            .set_bold()
            .set_font_color(header_text)
            .set_background_color(primary_color)
            .set_align(FormatAlign::CenterAcross)
            .set_align(FormatAlign::VerticalCenter);

        worksheet.set_row_height(0, 40)?;
        worksheet.merge_range(0, 0, 0, (columns.len() - 1) as u16, "Job Applications", &title_format)?;

        let subtitle_format = Format::new()
            .set_font_size(10)
            .set_italic()
            .set_font_color(Color::RGB(0x94A3B8))
            .set_background_color(primary_color)
            .set_align(FormatAlign::CenterAcross)
            .set_align(FormatAlign::VerticalCenter);

        worksheet.set_row_height(1, 22)?;
        let now = Utc::now().format("%d.%m.%Y %H:%M UTC").to_string();
        let subtitle_text = format!("Exported: {}  •  Applications: {}", now, applications.len());
        worksheet.merge_range(1, 0, 1, (columns.len() - 1) as u16, &subtitle_text, &subtitle_format)?;

        // ── Header row ──
        let header_format = Format::new()
            .set_bold()
            .set_font_size(10)
            .set_font_color(header_text)
            .set_background_color(header_bg)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_text_wrap()
            .set_border(FormatBorder::Thin)
            .set_border_color(border_color);

        let header_row = 2;
        worksheet.set_row_height(header_row, 30)?;
        for (i, (name, _)) in columns.iter().enumerate() {
            worksheet.write_string_with_format(header_row, i as u16, *name, &header_format)?;
        }

        // ── Data rows ──
        let data_start_row = 3;
        let empty: Vec<StatusEvent> = Vec::new();
        for (idx, app) in applications.iter().enumerate() {
            let row = data_start_row + idx as u32;
            let bg = if idx % 2 == 0 { alt_row_1 } else { alt_row_2 };

            let base_fmt = Format::new()
                .set_font_size(10)
                .set_background_color(bg)
                .set_align(FormatAlign::VerticalCenter)
                .set_border(FormatBorder::Thin)
                .set_border_color(border_color);
            let center_fmt = base_fmt.clone().set_align(FormatAlign::Center);
            let wrap_fmt = base_fmt.clone().set_text_wrap();
            let title_fmt = base_fmt.clone().set_bold();

            let events = events_by_application.get(&app.id).unwrap_or(&empty);
            let log = EventLog::new(events.clone());

            worksheet.set_row_height(row, 22)?;
            worksheet.write_number_with_format(row, 0, (idx + 1) as f64, &center_fmt)?;
            worksheet.write_string_with_format(row, 1, &app.title, &title_fmt)?;
            worksheet.write_string_with_format(row, 2, &app.employer, &base_fmt)?;

            let category = app
                .category_id
                .and_then(|id| category_names.get(&id))
                .map(String::as_str)
                .unwrap_or("—");
            worksheet.write_string_with_format(row, 3, category, &base_fmt)?;

            let status_fmt = Format::new()
                .set_font_size(10)
                .set_bold()
                .set_font_color(Color::White)
                .set_background_color(status_color(app.status))
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter)
                .set_border(FormatBorder::Thin)
                .set_border_color(border_color);
            worksheet.write_string_with_format(row, 4, app.status.label(), &status_fmt)?;

            let dates = [
                transition_date(&log, SUBMITTED_KINDS, app.submitted_at),
                transition_date(&log, CONFIRMED_KINDS, app.confirmed_at),
                transition_date(&log, RESPONSE_KINDS, app.responded_at),
                transition_date(&log, REJECTION_KINDS, app.rejected_at),
                app.interview_date,
                Some(app.created_at),
            ];
            for (offset, value) in dates.into_iter().enumerate() {
                worksheet.write_string_with_format(
                    row,
                    5 + offset as u16,
                    &format_moment(value),
                    &center_fmt,
                )?;
            }

            worksheet.write_string_with_format(row, 11, &status_trail(events), &wrap_fmt)?;
        }

        // ── Summary row ──
        let total_row = data_start_row + applications.len() as u32 + 1;
        let summary_fmt = Format::new()
            .set_bold()
            .set_font_size(10)
            .set_font_color(primary_color)
            .set_background_color(Color::RGB(0xE0E7FF))
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_border(FormatBorder::Thin)
            .set_border_color(border_color);

        worksheet.set_row_height(total_row, 26)?;
        worksheet.merge_range(
            total_row,
            0,
            total_row,
            2,
            &format!("Total: {}", applications.len()),
            &summary_fmt,
        )?;

        let count = |status: ApplicationStatus| applications.iter().filter(|a| a.status == status).count();
        let status_summary = format!(
            "Applied: {} | Interviews: {} | Rejected: {} | Accepted: {}",
            count(ApplicationStatus::Applied) + count(ApplicationStatus::Confirmed),
            count(ApplicationStatus::InterviewScheduled) + count(ApplicationStatus::InterviewPassed),
            count(ApplicationStatus::Rejected),
            count(ApplicationStatus::Accepted),
        );
        worksheet.merge_range(total_row, 3, total_row, (columns.len() - 1) as u16, &status_summary, &summary_fmt)?;

        worksheet.set_freeze_panes(3, 0)?;
        worksheet.autofilter(
            2,
            0,
            (data_start_row + applications.len() as u32).saturating_sub(1).max(2),
            (columns.len() - 1) as u16,
        )?;

        let buffer = workbook.save_to_buffer()?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 10, 0, 0).unwrap()
    }

    fn event(id: i64, kind: EventKind, occurred_at: DateTime<Utc>) -> StatusEvent {
        StatusEvent {
            id,
            application_id: Uuid::nil(),
            kind,
            occurred_at,
            note: String::new(),
            created_at: occurred_at,
        }
    }

    #[test]
    fn transition_dates_prefer_the_latest_event() {
        let log = EventLog::new(vec![
            event(1, EventKind::InterviewScheduled, at(5)),
            event(2, EventKind::DocumentsRequested, at(9)),
        ]);

        assert_eq!(transition_date(&log, RESPONSE_KINDS, Some(at(2))), Some(at(9)));
        assert_eq!(transition_date(&log, REJECTION_KINDS, Some(at(3))), Some(at(3)));
        assert_eq!(transition_date(&log, SUBMITTED_KINDS, None), None);
    }

    #[test]
    fn trail_keeps_the_newest_events_in_order() {
        let events: Vec<StatusEvent> = (1..=8)
            .rev()
            .map(|d| event(d as i64, EventKind::AnotherInterviewScheduled, at(d)))
            .collect();

        let trail = status_trail(&events);
        let lines: Vec<&str> = trail.lines().collect();

        assert_eq!(lines.len(), TRAIL_LIMIT + 1);
        assert_eq!(lines[0], "...");
        assert_eq!(lines[1], format!("{:02}.03.2024: Another Interview Scheduled", 9 - TRAIL_LIMIT));
        assert_eq!(lines[TRAIL_LIMIT], "08.03.2024: Another Interview Scheduled");
        assert_eq!(status_trail(&[]), "—");
    }

    #[test]
    fn workbook_is_produced_for_an_empty_export() {
        let buffer =
            ExportService::generate_applications_xlsx(&[], &HashMap::new(), &HashMap::new()).unwrap();
        assert!(buffer.starts_with(b"PK"));
    }
}
