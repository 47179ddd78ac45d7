//! Static links to the brand material kept on the shared drive.

use serde_json::Value;
use tracing::info;

use crate::discord::{Interaction, response};

struct Resource {
    command: &'static str,
    content: &'static str,
    /// Image links are only shown to whoever asked.
    ephemeral: bool,
}

const MEDIA_KIT: &str = "\
ℹ️ **Mídia Kit Oficial 4.events**
**Acesse todos os materiais visuais e audiovisuais oficiais da 4.events**
━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

📷 **Logos Oficiais da 4.events**
**📁 [CLIQUE AQUI para acessar a pasta no Google Drive](https://drive.google.com/drive/folders/1N24emGD_ZnB4Eu88UXfdNhZVnY8-uul0?usp=sharing)**
• Logotipos em diferentes versões (horizontal, profile, negativo)
• Diferentes formatos em alta resolução
• Versões para fundo claro e escuro

💎 **Ícones dos Produtos e Features**
**📁 [CLIQUE AQUI para acessar a pasta no Google Drive](https://drive.google.com/drive/folders/1TbxLIiJFNF9PdjtuzUCBmjc9rIONoqZT?usp=sharing)**
• Ícones de todas as funcionalidades (features) dos apps 4.events

🎬 **Materiais Audiovisuais e Animações**
**📁 [CLIQUE AQUI para acessar a pasta no Google Drive](https://drive.google.com/drive/folders/1QVlCzr8clpLih7vUEEzjVD6Ey53xeSyw?usp=sharing)**
• Logos animados
• Intros e outros materiais para vídeos
• Elementos visuais em movimento para apresentações
• Materiais para redes sociais e campanhas digitais

⚠️ **Diretrizes de Uso**
• **Mantenha as proporções originais dos logos**
• **Respeite as cores oficiais da marca**
• **Para dúvidas sobre uso, consulte o time de marketing**";

const PRESENTATIONS: &str = "\
ℹ️ **Apresentações Comerciais 4.events**
**Acesse todas as apresentações comerciais oficiais da 4.events**
━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

📁 **Apresentações Comerciais**
**📁 [CLIQUE AQUI para acessar pasta no Google Drive](https://drive.google.com/drive/folders/1Pgveln9kAC5RBaUce78ST6JakIPNIKOW?usp=sharing)**
• Apresentações comerciais em formato PDF
• Apresentações editáveis online
• Slides com dados atualizados e cases de sucesso

⚠️ **Importante:**
• Estas apresentações são de uso interno exclusivo da 4.events";

const TEMPLATES: &str = "\
ℹ️ **Modelos/Templates de Documentos 4.events**
**Acesse todos os modelos de documentos e templates com branding da 4.events**
━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

📁 **Modelos de Documentos**
**📁 [CLIQUE AQUI para acessar pasta no Google Drive](https://drive.google.com/drive/folders/1XlQOqlj7V6MV4O44goL51Zv_VjwDd8q6?usp=sharing)**
• Templates de documentos timbrados da 4.events
• Templates para relatórios e apresentações
• Documentos com identidade visual padronizada

⚠️ **Importante:**
• Estes modelos são de uso interno exclusivo da 4.events
• Não compartilhe externamente sem autorização
• Mantenha sempre a identidade visual padrão";

const RESOURCES: &[Resource] = &[
    Resource {
        command: "midiakit",
        content: MEDIA_KIT,
        ephemeral: false,
    },
    Resource {
        command: "apresentações",
        content: PRESENTATIONS,
        ephemeral: false,
    },
    Resource {
        command: "modelos",
        content: TEMPLATES,
        ephemeral: false,
    },
    Resource {
        command: "capa-linkedin",
        content: "https://agenciam2a.com.br/externo/4events-Capa-LinkedIn-Pessoal-Time.png",
        ephemeral: true,
    },
    Resource {
        command: "fundo-escritorio",
        content: "https://agenciam2a.com.br/externo/4events-fundo-escritorio.png",
        ephemeral: true,
    },
];

/// Reply for a resource command, or `None` when `command` is not one.
pub(super) fn reply(command: &str, interaction: &Interaction) -> Option<Value> {
    let resource = RESOURCES.iter().find(|resource| resource.command == command)?;
    info!(
        command,
        user = %interaction.requester().tag,
        "Resource accessed"
    );
    Some(if resource.ephemeral {
        response::ephemeral(resource.content)
    } else {
        response::message(resource.content)
    })
}
