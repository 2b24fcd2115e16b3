//! Career mentorship: a built-in catalog of guidance articles plus the
//! resume templates the scholarship office publishes on the server.

use std::sync::{Arc, LazyLock};

use chrono::NaiveDate;
use tracing::info;

use scholar_types::{CareerDocument, MentorshipArticle};

use super::{ResourceCell, Snapshot};
use crate::error::ClientError;
use crate::services::DocumentsApi;

struct Entry {
    id: &'static str,
    title: &'static str,
    summary: &'static str,
    content: &'static str,
    author: &'static str,
    author_title: &'static str,
    date: (i32, u32, u32),
    read_time: &'static str,
    category: &'static str,
    image_url: &'static str,
}

const ENTRIES: [Entry; 4] = [
    Entry {
        id: "1",
        title: "Finding Internships in Your Field",
        summary: "Learn strategies for securing internships that align with your career goals.",
        content: "The right internship can shape your career. Identify companies working in your \
                  field, use your university's career services and online platforms such as \
                  LinkedIn, and tailor your resume and cover letter to each application. Alumni \
                  at your target companies can refer you, and referrals are often considered \
                  first. Research each company before the interview and practice common \
                  questions. When an offer arrives, negotiate professionally so the placement \
                  serves your development.",
        author: "Sarah Johnson",
        author_title: "Career Advisor",
        date: (2025, 2, 15),
        read_time: "5 min",
        category: "Internships",
        image_url: "https://images.pexels.com/photos/3184465/pexels-photo-3184465.jpeg",
    },
    Entry {
        id: "2",
        title: "Building Your Professional Network",
        summary: "Effective networking strategies for university students and recent graduates.",
        content: "A strong network supports a long career. Keep a LinkedIn profile that shows \
                  your education, skills and projects. Go to industry events, career fairs and \
                  alumni gatherings, and aim for genuine relationships rather than quick job \
                  leads. Follow up with a personal message that recalls your conversation. \
                  Professional organizations widen your reach, and a mentor can guide you and \
                  introduce you to others. Help people in return; networking works both ways.",
        author: "Michael Carter",
        author_title: "Network Specialist",
        date: (2025, 2, 28),
        read_time: "7 min",
        category: "Networking",
        image_url: "https://images.pexels.com/photos/7176026/pexels-photo-7176026.jpeg",
    },
    Entry {
        id: "3",
        title: "Preparing for Technical Interviews",
        summary: "Essential tips and practice strategies for technical interviews in STEM fields.",
        content: "Preparation turns a technical interview into a conversation you can lead. \
                  Master the fundamentals of your field and practice explaining them clearly. \
                  Work through practice problems on the platforms your field uses and ask peers \
                  or mentors for mock interviews. Learn what the company builds and bring \
                  thoughtful questions. During the interview, think aloud and ask clarifying \
                  questions: interviewers judge how you approach a problem, not only the answer.",
        author: "Dr. Aisha Patel",
        author_title: "Technical Recruiter",
        date: (2025, 3, 5),
        read_time: "10 min",
        category: "Interviews",
        image_url: "https://images.pexels.com/photos/5673488/pexels-photo-5673488.jpeg",
    },
    Entry {
        id: "4",
        title: "Crafting a Standout Resume",
        summary: "Tips to create a resume that gets noticed by recruiters and hiring managers.",
        content: "Your resume is often the first impression you make. Use a clean layout that is \
                  easy to scan and open with a short summary of your goals. Describe achievements \
                  rather than duties and quantify them where you can. Match each version to the \
                  job description, and list relevant projects, internships and activities when \
                  work experience is thin. Keep it to one page early in your career, proofread \
                  it, and send it as a PDF so the formatting survives.",
        author: "James Wilson",
        author_title: "HR Director",
        date: (2025, 1, 20),
        read_time: "6 min",
        category: "Job Search",
        image_url: "https://images.pexels.com/photos/3760072/pexels-photo-3760072.jpeg",
    },
];

static CATALOG: LazyLock<Vec<MentorshipArticle>> =
    LazyLock::new(|| ENTRIES.iter().map(Entry::to_article).collect());

impl Entry {
    fn to_article(&self) -> MentorshipArticle {
        let (year, month, day) = self.date;
        MentorshipArticle {
            id: self.id.into(),
            title: self.title.into(),
            summary: self.summary.into(),
            content: self.content.into(),
            author: self.author.into(),
            author_title: Some(self.author_title.into()),
            date: NaiveDate::from_ymd_opt(year, month, day).expect("catalog date"),
            read_time: self.read_time.into(),
            category: self.category.into(),
            image_url: self.image_url.into(),
        }
    }
}

pub struct MentorshipHolder {
    api: Arc<dyn DocumentsApi>,
    templates: ResourceCell<Vec<CareerDocument>>,
}

impl MentorshipHolder {
    pub fn new(api: Arc<dyn DocumentsApi>) -> Self {
        Self {
            api,
            templates: ResourceCell::new(),
        }
    }

    pub fn articles(&self) -> &'static [MentorshipArticle] {
        &CATALOG
    }

    pub fn article(&self, id: &str) -> Result<&'static MentorshipArticle, ClientError> {
        CATALOG
            .iter()
            .find(|a| a.id == id)
            .ok_or_else(|| ClientError::NotFound("Article".into()))
    }

    pub fn templates(&self) -> Snapshot<Vec<CareerDocument>> {
        self.templates.snapshot()
    }

    pub async fn refresh_templates(&self) -> Result<(), ClientError> {
        self.templates.begin();
        match self.api.resume_templates().await {
            Ok(list) => {
                self.templates.fill(list);
                Ok(())
            }
            Err(e) => Err(self.templates.fail(e)),
        }
    }

    /// Templates are not part of the dashboard prefetch, so the first visit
    /// fetches them.
    pub async fn ensure_loaded(&self) {
        if !self.templates.is_populated() {
            let _ = self.refresh_templates().await;
        }
    }

    /// Fetch a template's bytes together with its file name.
    pub async fn download_template(&self, id: i64) -> Result<(String, Vec<u8>), ClientError> {
        let file_name = self
            .templates
            .read(|s| s.value.iter().find(|d| d.id == id).map(|d| d.file_name.clone()))
            .unwrap_or_else(|| format!("template-{}", id));
        let data = self
            .api
            .download_document(id)
            .await
            .map_err(|e| self.templates.fail(e))?;
        info!("Downloaded template {} ({} bytes)", file_name, data.len());
        Ok((file_name, data))
    }

    pub fn clear(&self) {
        self.templates.reset();
    }
}
