//! Enrollment lottery demo binary
//!
//! Seeds an in-memory directory with one oversubscribed course, runs a
//! lottery, and prints the report and metrics.

use enrollment_core::{
    College, CollegeId, Config, Course, CourseId, CourseStatus, Engine, EnrollmentStatus,
    InMemoryDirectory, Student, StudentId, Teacher, TeacherId, UserId,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting enrollment lottery demo");

    // Load configuration
    let config = Config::from_env()?;

    let directory = Arc::new(InMemoryDirectory::new());
    let college = College {
        id: CollegeId::new(),
        name: "College of Engineering".to_string(),
        code: "ENG".to_string(),
    };
    let teacher = Teacher {
        id: TeacherId::new(),
        teacher_no: "T001".to_string(),
        college_id: college.id,
        user_id: UserId::new(),
    };
    let course = Course {
        id: CourseId::new(),
        code: "ENG101".to_string(),
        name: "Engineering Design".to_string(),
        credits: 3,
        capacity: 2,
        status: CourseStatus::Enabled,
        college_id: college.id,
        teacher_id: teacher.id,
        prerequisites: vec![],
    };
    directory.insert_college(college.clone());
    directory.insert_teacher(teacher);
    directory.insert_course(course.clone());

    let engine = Engine::open(config, directory.clone())?;

    for n in 1..=5 {
        let student = Student {
            id: StudentId::new(),
            student_no: format!("S{:03}", n),
            college_id: college.id,
            user_id: UserId::new(),
        };
        directory.insert_student(student.clone());
        engine.ledger.request_enrollment(student.id, course.id).await?;
    }

    let report = engine.lottery.run_college_lottery(college.id).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    tracing::info!(
        "Course {}: {} granted, {} denied",
        course.code,
        engine
            .ledger
            .count_by_course_and_status(course.id, EnrollmentStatus::Granted),
        engine
            .ledger
            .count_by_course_and_status(course.id, EnrollmentStatus::Denied)
    );

    print!("{}", engine.metrics.export());
    Ok(())
}
